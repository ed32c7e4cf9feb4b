//! Full-text search over threads and posts

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use forumctl_core::models::ValidationError;
use forumctl_core::{Envelope, SearchResult, SearchScope};
use serde::Deserialize;
use serde_json::json;

use crate::engine::SearchRequest;
use crate::http::error::ApiError;
use crate::http::extractors::{optional_uuid, QueryParams};
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub scope: Option<String>,
    pub category_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SearchParams {
    fn into_request(self) -> Result<SearchRequest, ValidationError> {
        let scope = match self.scope.as_deref() {
            Some(s) if !s.trim().is_empty() => s.trim().parse::<SearchScope>()?,
            _ => SearchScope::default(),
        };
        Ok(SearchRequest {
            category_id: optional_uuid(self.category_id.as_deref(), "category_id")?,
            query: self.q.unwrap_or_default(),
            scope,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// GET /search
async fn search(
    State(state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<SearchParams>,
) -> Result<Json<Envelope<Vec<SearchResult>>>, ApiError> {
    let request = params.into_request()?;
    let query = request.query.clone();
    let results = state.engine.search(request).await?;
    let count = results.len();
    Ok(Json(
        Envelope::ok(results).with_meta(json!({ "query": query, "count": count })),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_defaults_to_all() {
        let req = SearchParams {
            q: Some("rust".into()),
            ..Default::default()
        }
        .into_request()
        .unwrap();
        assert_eq!(req.scope, SearchScope::All);
        assert_eq!(req.query, "rust");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = SearchParams {
            q: Some("rust".into()),
            scope: Some("users".into()),
            ..Default::default()
        }
        .into_request()
        .unwrap_err();
        assert_eq!(err.field(), "type");
    }
}
