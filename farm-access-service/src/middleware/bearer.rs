use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use service_core::error::AppError;

/// Body of every bearer rejection. Missing, malformed, unknown, expired,
/// revoked and under-privileged secrets are indistinguishable to the caller.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

pub fn invalid_token() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!(INVALID_TOKEN_MESSAGE))
}

/// Raw access secret taken from `Authorization: Bearer <secret>`.
///
/// Not `Debug`: the secret must never reach a span or log line.
pub struct BearerSecret(String);

impl BearerSecret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerSecret
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
            .ok_or_else(invalid_token)?;

        Ok(BearerSecret(secret.to_string()))
    }
}
