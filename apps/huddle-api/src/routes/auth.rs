//! Token endpoints.
//!
//! Clients exchange a signed identity assertion for a session token at
//! `/auth/login`. With `DEV_LOGIN=true` `/auth/token` mints one for any user id.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::{bearer_token, AuthUser};
use crate::auth::{assertion, tokens};
use crate::error::{ApiError, FieldError};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/token", post(issue_token))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user_id: String,
}

impl TokenResponse {
    fn bearer(access_token: String, user_id: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens::PAT_TTL_SECS,
            user_id,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub assertion: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let claims = assertion::validate_assertion(
        &body.assertion,
        &state.jwks,
        state.kv.as_ref(),
        &state.config.identity_audience,
        &state.config.identity_url,
    )
    .await?;

    let access_token = tokens::issue_pat(state.kv.as_ref(), &claims.sub).await?;
    tracing::info!(user_id = %claims.sub, "user logged in");

    Ok(Json(TokenResponse::bearer(access_token, claims.sub)))
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/token
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub user_id: Option<String>,
}

async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !state.config.dev_login {
        return Err(ApiError::not_found("Not found"));
    }
    let user_id = body.user_id.as_deref().map(str::trim).unwrap_or_default();
    if user_id.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "userId".to_string(),
            message: "User id is required".to_string(),
        }]));
    }

    let access_token = tokens::issue_pat(state.kv.as_ref(), user_id).await?;
    tracing::info!(%user_id, "dev token issued");

    Ok(Json(TokenResponse::bearer(access_token, user_id.to_string())))
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/logout
// ---------------------------------------------------------------------------

async fn logout(
    _user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Ok(token) = bearer_token(&headers) {
        tokens::revoke_pat(state.kv.as_ref(), token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
