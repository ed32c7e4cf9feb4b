//! API errors with IntoResponse
//!
//! Every failure leaves as the `{error, code, details?}` envelope. Database
//! and internal errors are logged here and reach the caller only as a
//! generic message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use forumctl_core::models::ValidationError;
use forumctl_core::{ErrorEnvelope, ErrorKind, ForumError};

#[derive(Debug)]
pub struct ApiError(pub ForumError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::AuthError => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::DatabaseError | ErrorKind::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            ForumError::Database {
                constraint,
                message,
            } => {
                tracing::error!(constraint = ?constraint, "Database error: {}", message);
            }
            ForumError::Internal { message } => {
                tracing::error!("Internal error: {}", message);
            }
            _ => {}
        }

        let status = self.status();
        let body = Json(ErrorEnvelope::from(&self.0));
        let mut response = (status, body).into_response();

        if let ForumError::RateLimited { retry_after_secs } = self.0 {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<ForumError> for ApiError {
    fn from(e: ForumError) -> Self {
        Self(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self(ForumError::Validation(e))
    }
}
