//! Thread endpoints, including the thread-scoped post reads and replies

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use forumctl_core::models::{
    LikeOutcome, Pagination, PaginationParams, Post, PostWithChildren, Thread, ValidationError,
};
use forumctl_core::{Envelope, PostNode, ThreadSort};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::Deleted;
use crate::engine::{CreatePost, CreateThread};
use crate::http::error::ApiError;
use crate::http::extractors::{optional_uuid, JsonBody, MaybeActor, QueryParams, ValidUuid};
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListThreadsQuery {
    pub category_id: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub category_id: Uuid,
    pub title: String,
    pub content: String,
}

/// Body of the pin and lock endpoints
#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    pub value: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub parent_post_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ByDepthQuery {
    pub parent_id: Option<String>,
    pub max_depth: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreeQuery {
    pub max_depth: Option<u32>,
    /// Comma-separated post ids the caller has expanded
    pub expanded: Option<String>,
}

fn parse_expanded(raw: Option<&str>) -> Result<HashSet<Uuid>, ValidationError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|_| ValidationError::InvalidFormat {
                field: "expanded",
                reason: "expected comma-separated UUIDs",
            })
        })
        .collect()
}

/// GET /threads
async fn list_threads(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<ListThreadsQuery>,
) -> Result<Json<Envelope<Vec<Thread>>>, ApiError> {
    let category_id = optional_uuid(query.category_id.as_deref(), "category_id")?;
    let sort = match query.sort.as_deref() {
        Some(s) => s.parse::<ThreadSort>()?,
        None => ThreadSort::default(),
    };
    let page = Pagination::from(PaginationParams {
        page: query.page,
        limit: query.limit,
    });

    let threads = state.engine.list_threads(category_id, sort, page).await?;
    Ok(Json(Envelope::paginated(threads)))
}

/// POST /threads
async fn create_thread(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    JsonBody(req): JsonBody<CreateThreadRequest>,
) -> Result<(StatusCode, Json<Envelope<Thread>>), ApiError> {
    let thread = state
        .engine
        .create_thread(
            actor.actor(),
            CreateThread {
                category_id: req.category_id,
                title: req.title,
                content: req.content,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(thread))))
}

/// GET /threads/{id} - counts a view
async fn get_thread(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<Thread>>, ApiError> {
    let thread = state.engine.get_thread(id).await?;
    Ok(Json(Envelope::ok(thread)))
}

/// DELETE /threads/{id}
async fn delete_thread(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<Deleted>>, ApiError> {
    state.engine.delete_thread(actor.actor(), id).await?;
    Ok(Json(Envelope::ok(Deleted { deleted: 1 })))
}

/// PUT /threads/{id}/pin
async fn set_pinned(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    ValidUuid(id): ValidUuid,
    JsonBody(req): JsonBody<FlagRequest>,
) -> Result<Json<Envelope<Thread>>, ApiError> {
    let thread = state.engine.set_pinned(actor.actor(), id, req.value).await?;
    Ok(Json(Envelope::ok(thread)))
}

/// PUT /threads/{id}/lock
async fn set_locked(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    ValidUuid(id): ValidUuid,
    JsonBody(req): JsonBody<FlagRequest>,
) -> Result<Json<Envelope<Thread>>, ApiError> {
    let thread = state.engine.set_locked(actor.actor(), id, req.value).await?;
    Ok(Json(Envelope::ok(thread)))
}

/// GET /threads/{id}/posts - flat depth-tagged batch
async fn list_posts(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    QueryParams(query): QueryParams<LimitQuery>,
) -> Result<Json<Envelope<Vec<Post>>>, ApiError> {
    let posts = state.engine.thread_posts_hierarchical(id, query.limit).await?;
    let count = posts.len();
    Ok(Json(Envelope::ok(posts).with_meta(json!({ "count": count }))))
}

/// POST /threads/{id}/posts - root or nested reply
async fn create_post(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    ValidUuid(id): ValidUuid,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> Result<(StatusCode, Json<Envelope<Post>>), ApiError> {
    let post = state
        .engine
        .create_post(
            actor.actor(),
            CreatePost {
                thread_id: id,
                parent_post_id: req.parent_post_id,
                content: req.content,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(post))))
}

/// GET /threads/{id}/posts/by-depth
async fn posts_by_depth(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    QueryParams(query): QueryParams<ByDepthQuery>,
) -> Result<Json<Envelope<Vec<PostWithChildren>>>, ApiError> {
    let parent_id = optional_uuid(query.parent_id.as_deref(), "parent_id")?;
    let posts = state
        .engine
        .posts_by_depth(id, parent_id, query.max_depth, query.limit)
        .await?;
    Ok(Json(Envelope::ok(posts)))
}

/// GET /threads/{id}/tree
async fn thread_tree(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    QueryParams(query): QueryParams<TreeQuery>,
) -> Result<Json<Envelope<Vec<PostNode>>>, ApiError> {
    let expanded = parse_expanded(query.expanded.as_deref())?;
    let roots = state.engine.thread_tree(id, query.max_depth, &expanded).await?;
    Ok(Json(Envelope::ok(roots)))
}

/// POST /threads/{id}/like
async fn toggle_like(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<LikeOutcome>>, ApiError> {
    let outcome = state.engine.toggle_thread_like(actor.actor(), id).await?;
    Ok(Json(Envelope::ok(outcome)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/threads", get(list_threads).post(create_thread))
        .route("/threads/{id}", get(get_thread).delete(delete_thread))
        .route("/threads/{id}/pin", put(set_pinned))
        .route("/threads/{id}/lock", put(set_locked))
        .route("/threads/{id}/posts", get(list_posts).post(create_post))
        .route("/threads/{id}/posts/by-depth", get(posts_by_depth))
        .route("/threads/{id}/tree", get(thread_tree))
        .route("/threads/{id}/like", post(toggle_like))
}
