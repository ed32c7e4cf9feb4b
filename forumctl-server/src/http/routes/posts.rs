//! Post endpoints addressed by post id

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use forumctl_core::models::{ContextEntry, LikeOutcome, Post};
use forumctl_core::Envelope;

use super::Deleted;
use crate::http::error::ApiError;
use crate::http::extractors::{MaybeActor, ValidUuid};
use crate::http::server::AppState;

/// GET /posts/{id}
async fn get_post(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<Post>>, ApiError> {
    let post = state.engine.get_post(id).await?;
    Ok(Json(Envelope::ok(post)))
}

/// DELETE /posts/{id} - reports how many posts the delete removed
async fn delete_post(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<Deleted>>, ApiError> {
    let deleted = state.engine.delete_post(actor.actor(), id).await?;
    Ok(Json(Envelope::ok(Deleted { deleted })))
}

/// GET /posts/{id}/context
async fn post_context(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<Vec<ContextEntry>>>, ApiError> {
    let entries = state.engine.post_context(id).await?;
    Ok(Json(Envelope::ok(entries)))
}

/// POST /posts/{id}/like
async fn toggle_like(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<LikeOutcome>>, ApiError> {
    let outcome = state.engine.toggle_post_like(actor.actor(), id).await?;
    Ok(Json(Envelope::ok(outcome)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts/{id}", get(get_post).delete(delete_post))
        .route("/posts/{id}/context", get(post_context))
        .route("/posts/{id}/like", post(toggle_like))
}
