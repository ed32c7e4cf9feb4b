//! Category endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use forumctl_core::models::Category;
use forumctl_core::Envelope;
use serde::Deserialize;

use crate::engine::CreateCategory;
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, MaybeActor, ValidUuid};
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// GET /categories
async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<Vec<Category>>>, ApiError> {
    let categories = state.engine.list_categories().await?;
    Ok(Json(Envelope::ok(categories)))
}

/// POST /categories - moderators only
async fn create_category(
    State(state): State<Arc<AppState>>,
    actor: MaybeActor,
    JsonBody(req): JsonBody<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Envelope<Category>>), ApiError> {
    let category = state
        .engine
        .create_category(
            actor.actor(),
            CreateCategory {
                name: req.name,
                description: req.description,
                color: req.color,
                icon: req.icon,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(category))))
}

/// GET /categories/{id}
async fn get_category(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<Category>>, ApiError> {
    let category = state.engine.get_category(id).await?;
    Ok(Json(Envelope::ok(category)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", get(get_category))
}
