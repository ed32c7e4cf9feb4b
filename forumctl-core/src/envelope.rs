//! Success and error envelopes returned by every entry point

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ErrorKind, ForumError};
use crate::models::{Paginated, PaginationMeta};

/// Generic message for storage and internal failures
pub const GENERIC_ERROR_MESSAGE: &str = "an internal error occurred";

/// Success envelope: `data` plus optional `meta` and `pagination`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data,
            meta: None,
            pagination: None,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn paginated(page: Paginated<T>) -> Self {
        let meta = page.meta();
        Self {
            data: page.items,
            meta: None,
            pagination: Some(meta),
        }
    }
}

/// Error envelope: `{error, code, details?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&ForumError> for ErrorEnvelope {
    fn from(err: &ForumError) -> Self {
        let error = if err.is_client_facing() {
            err.to_string()
        } else {
            GENERIC_ERROR_MESSAGE.to_owned()
        };

        let details = match err {
            ForumError::Validation(v) => {
                let mut fields = Map::new();
                fields.insert(v.field().to_owned(), Value::String(v.to_string()));
                Some(Value::Object(fields))
            }
            ForumError::RateLimited { retry_after_secs } => {
                Some(json!({ "retryAfter": retry_after_secs }))
            }
            _ => None,
        };

        Self {
            error,
            code: err.kind(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pagination, ValidationError};

    #[test]
    fn success_envelope_omits_empty_sections() {
        let json = serde_json::to_value(Envelope::ok(42)).unwrap();
        assert_eq!(json, json!({ "data": 42 }));
    }

    #[test]
    fn paginated_envelope_carries_meta() {
        let page = Paginated {
            items: vec![1, 2],
            total: 45,
            page: Pagination::new(1, 20),
        };
        let json = serde_json::to_value(Envelope::paginated(page)).unwrap();
        assert_eq!(json["pagination"]["totalPages"], 3);
        assert_eq!(json["pagination"]["hasMore"], true);
        assert_eq!(json["data"], json!([1, 2]));
    }

    #[test]
    fn validation_details_are_field_keyed() {
        let err = ForumError::from(ValidationError::Empty { field: "content" });
        let env = ErrorEnvelope::from(&err);
        assert_eq!(env.code, ErrorKind::ValidationError);
        assert_eq!(env.details.unwrap()["content"], "content cannot be empty");
    }

    #[test]
    fn database_errors_are_generic() {
        let err = ForumError::Database {
            constraint: Some("thread_likes_thread_id_user_id_key".into()),
            message: "duplicate key value violates unique constraint".into(),
        };
        let env = ErrorEnvelope::from(&err);
        assert_eq!(env.error, GENERIC_ERROR_MESSAGE);
        assert!(env.details.is_none());
    }

    #[test]
    fn rate_limit_carries_retry_hint() {
        let env = ErrorEnvelope::from(&ForumError::RateLimited {
            retry_after_secs: 12,
        });
        assert_eq!(env.details.unwrap()["retryAfter"], 12);
    }
}
