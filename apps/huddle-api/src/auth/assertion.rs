//! Identity assertions: short-lived EdDSA JWTs signed by the identity service
//! and exchanged once for a session token.

use jsonwebtoken::{Algorithm, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::jwks::JwksClient;
use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub iss: String,
    /// The user id.
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Assertions live five minutes, so a seen `jti` only has to be kept that long.
const JTI_TTL_SECS: u64 = 300;

fn jti_key(jti: &str) -> String {
    format!("huddle:assertion_jti:{jti}")
}

/// Verify an assertion and mark it used.
///
/// The signature must match a key from `jwks`, `exp` must be in the future,
/// `aud` and `iss` must match, and the `jti` must not have been seen before.
pub async fn validate_assertion(
    token: &str,
    jwks: &JwksClient,
    kv: &dyn KeyValueStore,
    audience: &str,
    issuer: &str,
) -> Result<IdentityClaims, ApiError> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| {
        tracing::debug!(error = %e, "assertion header decode failed");
        ApiError::unauthorized("Invalid assertion")
    })?;
    let kid = header
        .kid
        .ok_or_else(|| ApiError::unauthorized("Assertion missing kid"))?;

    let key = jwks.get_key(&kid).await?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_audience(&[audience]);
    validation.set_issuer(&[issuer]);

    let claims = jsonwebtoken::decode::<IdentityClaims>(token, &key, &validation)
        .map_err(|e| {
            tracing::debug!(error = %e, "assertion rejected");
            ApiError::unauthorized("Invalid or expired assertion")
        })?
        .claims;

    let seen = jti_key(&claims.jti);
    if kv.get(&seen).await?.is_some() {
        tracing::warn!(jti = %claims.jti, sub = %claims.sub, "assertion replayed");
        return Err(ApiError::unauthorized("Assertion already used"));
    }
    kv.set_ex(&seen, "1", JTI_TTL_SECS).await?;

    Ok(claims)
}
