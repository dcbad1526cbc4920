//! Identidad del actor
//!
//! La autenticación la hace el gateway; este extractor solo lee los headers
//! `X-User-Id` y `X-User-Role` que el gateway agrega a cada request.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::models::auth::{Actor, UserRole};
use crate::utils::errors::{invalid_argument, AppError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::Forbidden("authenticated user required".to_string()))?;
        let id = Uuid::parse_str(raw_id)
            .map_err(|_| invalid_argument(format!("invalid {} header", USER_ID_HEADER)))?;

        let role = match header(parts, USER_ROLE_HEADER) {
            Some(raw) => UserRole::from_str(raw)
                .ok_or_else(|| invalid_argument(format!("unknown role '{}'", raw)))?,
            None => UserRole::Customer,
        };

        Ok(Actor { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(builder: axum::http::request::Builder) -> Result<Actor, AppError> {
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_from_headers() {
        let id = Uuid::new_v4();
        let actor = extract(
            Request::builder()
                .header(USER_ID_HEADER, id.to_string())
                .header(USER_ROLE_HEADER, "admin"),
        )
        .await
        .unwrap();
        assert_eq!(actor, Actor::admin(id));

        let customer = extract(Request::builder().header(USER_ID_HEADER, id.to_string()))
            .await
            .unwrap();
        assert_eq!(customer.role, UserRole::Customer);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_identity() {
        assert!(matches!(extract(Request::builder()).await, Err(AppError::Forbidden(_))));
        assert!(matches!(
            extract(Request::builder().header(USER_ID_HEADER, "nope")).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            extract(
                Request::builder()
                    .header(USER_ID_HEADER, Uuid::new_v4().to_string())
                    .header(USER_ROLE_HEADER, "root")
            )
            .await,
            Err(AppError::InvalidArgument(_))
        ));
    }
}
