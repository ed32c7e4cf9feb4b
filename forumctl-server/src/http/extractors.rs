//! Custom Axum extractors
//!
//! Rejections are turned into [`ApiError`] so malformed ids, bodies and
//! query strings answer with the same envelope as every other failure.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use forumctl_core::models::{Actor, Role, ValidationError};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::ApiError;

/// Header carrying the authenticated user's id, set by the auth gateway
pub const USER_ID_HEADER: &str = "x-forum-user-id";

/// Header carrying the authenticated user's role
pub const USER_ROLE_HEADER: &str = "x-forum-user-role";

/// The calling actor, `None` when the request is anonymous
#[derive(Debug, Clone, Copy)]
pub struct MaybeActor(pub Option<Actor>);

impl MaybeActor {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

/// Identity from the gateway headers; no id header means anonymous.
pub fn actor_from_parts(parts: &Parts) -> Result<Option<Actor>, ValidationError> {
    let Some(raw_id) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let user_id = raw_id
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or(ValidationError::InvalidFormat {
            field: USER_ID_HEADER,
            reason: "invalid UUID format",
        })?;

    let role = match parts.headers.get(USER_ROLE_HEADER) {
        None => Role::default(),
        Some(raw) => raw
            .to_str()
            .map_err(|_| ValidationError::InvalidFormat {
                field: USER_ROLE_HEADER,
                reason: "not valid text",
            })?
            .trim()
            .parse::<Role>()?,
    };

    Ok(Some(Actor::new(user_id, role)))
}

impl<S> FromRequestParts<S> for MaybeActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(actor_from_parts(parts)?))
    }
}

/// Extract and validate a UUID from path
pub struct ValidUuid(pub Uuid);

impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ValidationError::Empty { field: "id" })?;

        let uuid = Uuid::parse_str(&id).map_err(|_| ValidationError::InvalidFormat {
            field: "id",
            reason: "invalid UUID format",
        })?;

        Ok(Self(uuid))
    }
}

/// `Query` with enveloped rejections
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|_| ValidationError::InvalidFormat {
                field: "query",
                reason: "malformed query string",
            })?;
        Ok(Self(value))
    }
}

/// `Json` with enveloped rejections
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(%rejection, "rejected request body");
            ValidationError::InvalidFormat {
                field: "body",
                reason: "malformed JSON body",
            }
        })?;
        Ok(Self(value))
    }
}

/// Parse an optional uuid-valued query parameter.
pub fn optional_uuid(raw: Option<&str>, field: &'static str) -> Result<Option<Uuid>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Uuid::parse_str(s).map(Some).map_err(|_| ValidationError::InvalidFormat {
            field,
            reason: "invalid UUID format",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = HttpRequest::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn no_headers_is_anonymous() {
        assert!(actor_from_parts(&parts(&[])).unwrap().is_none());
    }

    #[test]
    fn headers_build_actor() {
        let id = Uuid::new_v4();
        let actor = actor_from_parts(&parts(&[
            (USER_ID_HEADER, &id.to_string()),
            (USER_ROLE_HEADER, "moderator"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(actor.user_id, id);
        assert!(actor.is_moderator());
    }

    #[test]
    fn role_defaults_to_member() {
        let id = Uuid::new_v4();
        let actor = actor_from_parts(&parts(&[(USER_ID_HEADER, &id.to_string())]))
            .unwrap()
            .unwrap();
        assert_eq!(actor.role, Role::Member);
    }

    #[test]
    fn bad_id_or_role_is_rejected() {
        assert!(actor_from_parts(&parts(&[(USER_ID_HEADER, "not-a-uuid")])).is_err());
        let id = Uuid::new_v4().to_string();
        assert!(actor_from_parts(&parts(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "god")])).is_err());
    }

    #[test]
    fn optional_uuid_parsing() {
        assert_eq!(optional_uuid(None, "category_id").unwrap(), None);
        assert_eq!(optional_uuid(Some(""), "category_id").unwrap(), None);
        assert!(optional_uuid(Some("nope"), "category_id").is_err());
    }
}
