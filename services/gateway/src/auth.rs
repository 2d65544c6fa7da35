use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// API credentials pulled from request headers.
///
/// Resolution to a user happens in the engine; a missing or unknown pair
/// surfaces as 400 "User not found".
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for ApiCredentials
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = header(parts, "X-API-KEY");
        let secret = header(parts, "X-API-SECRET");
        match (key, secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok(ApiCredentials {
                    key: key.to_string(),
                    secret: secret.to_string(),
                })
            }
            _ => Err(AppError::BadRequest("User not found".to_string())),
        }
    }
}
