//! Bearer token extraction.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::auth::tokens;
use crate::error::ApiError;
use crate::AppState;

/// The user behind a valid `Authorization: Bearer <token>` header.
///
/// Every REST and stream endpoint takes this as its first extractor; a request
/// without a live token never reaches the handler.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Why a request was rejected before reaching its handler. Always a 401.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingHeader,
    Malformed,
    InvalidToken,
    LookupFailed,
}

impl AuthError {
    fn message(&self) -> &'static str {
        match self {
            Self::MissingHeader => "Missing Authorization header",
            Self::Malformed => "Invalid Authorization header format",
            Self::InvalidToken => "Invalid or expired token",
            Self::LookupFailed => "Token lookup failed",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::unauthorized(self.message()).into_response()
    }
}

/// The raw token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;
    match header.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::Malformed),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;

        let data = tokens::lookup_pat(state.kv.as_ref(), token)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err.message, "token lookup failed");
                AuthError::LookupFailed
            })?
            .ok_or(AuthError::InvalidToken)?;

        Ok(AuthUser {
            user_id: data.user_id,
        })
    }
}
