//! Session access tokens.
//!
//! Tokens are opaque strings minted at login and stored in the key-value
//! store next to the user they resolve to.

use serde::{Deserialize, Serialize};

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

/// Access token TTL in seconds (1 hour).
pub const PAT_TTL_SECS: u64 = 3600;

/// Data stored alongside an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct PatData {
    pub user_id: String,
}

pub fn generate_pat() -> String {
    generate_opaque_token("pat", 32)
}

fn pat_key(token: &str) -> String {
    format!("huddle:pat:{token}")
}

pub async fn store_pat(
    kv: &dyn KeyValueStore,
    token: &str,
    data: &PatData,
) -> Result<(), ApiError> {
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&pat_key(token), &value, PAT_TTL_SECS).await
}

/// Mint and store a fresh token for `user_id`.
pub async fn issue_pat(kv: &dyn KeyValueStore, user_id: &str) -> Result<String, ApiError> {
    let token = generate_pat();
    store_pat(
        kv,
        &token,
        &PatData {
            user_id: user_id.to_string(),
        },
    )
    .await?;
    Ok(token)
}

pub async fn lookup_pat(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<PatData>, ApiError> {
    match kv.get(&pat_key(token)).await? {
        Some(v) => {
            let data: PatData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

pub async fn revoke_pat(kv: &dyn KeyValueStore, token: &str) -> Result<(), ApiError> {
    kv.del(&pat_key(token)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::kv::MemoryStore;

    #[test]
    fn generated_tokens_are_prefixed_and_unique() {
        let a = generate_pat();
        let b = generate_pat();
        assert!(a.starts_with("pat_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn issued_token_resolves_until_revoked() {
        let kv = MemoryStore::new();
        let token = issue_pat(&kv, "usr_1").await.unwrap();

        let data = lookup_pat(&kv, &token).await.unwrap().unwrap();
        assert_eq!(data.user_id, "usr_1");

        revoke_pat(&kv, &token).await.unwrap();
        assert!(lookup_pat(&kv, &token).await.unwrap().is_none());
    }
}
