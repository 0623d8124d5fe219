//! HTTP surface of the suggestion workflow

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use std::str::FromStr;
use uuid::Uuid;

pub mod error;
pub mod suggestions;

pub use error::ApiError;

pub const X_USER_ID: &str = "X-User-ID";

/// The calling user, as established by the session layer in front of this service.
#[derive(Debug)]
pub struct ExtractUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ExtractUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(X_USER_ID) else {
            return Err((StatusCode::BAD_REQUEST, "`X-User-ID` header is missing"));
        };

        header
            .to_str()
            .ok()
            .and_then(|value| Uuid::from_str(value).ok())
            .map(ExtractUser)
            .ok_or((StatusCode::BAD_REQUEST, "invalid user id"))
    }
}
