/// Error taxonomy shared by every engine component.
///
/// The store, the mutation engine and the permission guard all fail with
/// [`ForumError`]; callers branch on [`ForumError::kind`] instead of
/// inspecting storage-specific codes.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ValidationError;

/// Stable error codes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    AuthError,
    Forbidden,
    NotFound,
    DatabaseError,
    RateLimited,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::AuthError => "auth_error",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::DatabaseError => "database_error",
            Self::RateLimited => "rate_limited",
            Self::InternalError => "internal_error",
        }
    }
}

/// Main error type for forum operations
#[derive(Error, Debug)]
pub enum ForumError {
    /// Malformed input
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// No authenticated actor
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated but not permitted
    #[error("{reason}")]
    Forbidden { reason: String },

    /// Referenced thread/post/category absent
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// Storage failure; `constraint` names the violated constraint when known
    #[error("database error: {message}")]
    Database {
        constraint: Option<String>,
        message: String,
    },

    /// Too many requests
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Unexpected failure
    #[error("internal error: {message}")]
    Internal { message: String },
}

pub type ForumResult<T> = Result<T, ForumError>;

impl ForumError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Unauthenticated => ErrorKind::AuthError,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Database { .. } => ErrorKind::DatabaseError,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Internal { .. } => ErrorKind::InternalError,
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the message is safe to show to the caller verbatim.
    pub fn is_client_facing(&self) -> bool {
        !matches!(self, Self::Database { .. } | Self::Internal { .. })
    }
}
