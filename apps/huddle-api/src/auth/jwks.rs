//! Signing keys of the identity service, fetched from its JWKS document.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::ApiError;

/// How long a fetched key set is trusted before it is fetched again.
const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Ed25519 public keys by `kid`, refreshed from the identity service on a
/// cache miss or once [`CACHE_TTL`] has passed.
#[derive(Clone)]
pub struct JwksClient {
    jwks_url: String,
    http: reqwest::Client,
    cache: Arc<RwLock<KeyCache>>,
}

struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < CACHE_TTL)
    }
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    crv: Option<String>,
    x: Option<String>,
}

impl JwksClient {
    /// Keys served at `{identity_url}/.well-known/jwks.json`.
    pub fn new(identity_url: &str) -> Self {
        Self {
            jwks_url: format!(
                "{}/.well-known/jwks.json",
                identity_url.trim_end_matches('/')
            ),
            http: reqwest::Client::new(),
            cache: Arc::new(RwLock::new(KeyCache {
                keys: HashMap::new(),
                fetched_at: None,
            })),
        }
    }

    /// A client that already holds `key` and never fetches. Used by tests.
    pub fn with_static_key(kid: &str, key: DecodingKey) -> Self {
        let client = Self::new("");
        let cache = KeyCache {
            keys: HashMap::from([(kid.to_string(), key)]),
            fetched_at: Some(Instant::now() + Duration::from_secs(86400)),
        };
        Self {
            cache: Arc::new(RwLock::new(cache)),
            ..client
        }
    }

    /// The decoding key for `kid`, fetching the key set when it is unknown or stale.
    pub async fn get_key(&self, kid: &str) -> Result<DecodingKey, ApiError> {
        {
            let cache = self.cache.read().await;
            if cache.is_fresh() {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        self.refresh().await?;

        self.cache
            .read()
            .await
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Unknown signing key"))
    }

    async fn refresh(&self) -> Result<(), ApiError> {
        tracing::info!(url = %self.jwks_url, "fetching identity JWKS");

        let doc: JwksDocument = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                tracing::error!(error = %e, "JWKS fetch failed");
                ApiError::internal("Failed to fetch identity keys")
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "JWKS parse failed");
                ApiError::internal("Failed to parse identity keys")
            })?;

        let keys = ed25519_keys(doc.keys);
        tracing::debug!(count = keys.len(), "identity JWKS loaded");

        let mut cache = self.cache.write().await;
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }
}

/// Keeps the OKP/Ed25519 entries; anything else in the document is skipped.
fn ed25519_keys(entries: Vec<Jwk>) -> HashMap<String, DecodingKey> {
    let mut keys = HashMap::new();
    for entry in entries {
        if entry.kty != "OKP" || entry.crv.as_deref() != Some("Ed25519") {
            continue;
        }
        let (Some(kid), Some(x)) = (entry.kid, entry.x) else {
            continue;
        };
        match URL_SAFE_NO_PAD.decode(&x) {
            Ok(public_bytes) => {
                keys.insert(kid, DecodingKey::from_ed_der(&public_bytes));
            }
            Err(e) => tracing::warn!(%kid, error = %e, "skipping JWK with bad x value"),
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwk(kid: &str, kty: &str, crv: &str, x: &str) -> Jwk {
        Jwk {
            kid: Some(kid.to_string()),
            kty: kty.to_string(),
            crv: Some(crv.to_string()),
            x: Some(x.to_string()),
        }
    }

    #[test]
    fn keeps_only_ed25519_keys() {
        let x = URL_SAFE_NO_PAD.encode([9u8; 32]);
        let keys = ed25519_keys(vec![
            jwk("ed", "OKP", "Ed25519", &x),
            jwk("rsa", "RSA", "", &x),
            jwk("x25519", "OKP", "X25519", &x),
            jwk("bad", "OKP", "Ed25519", "not base64!"),
        ]);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("ed"));
    }

    #[tokio::test]
    async fn static_key_is_served_without_fetching() {
        let client = JwksClient::with_static_key("k1", DecodingKey::from_ed_der(&[9u8; 32]));
        assert!(client.get_key("k1").await.is_ok());
    }
}
