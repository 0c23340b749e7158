#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use ed25519_dalek::{SigningKey, VerifyingKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use tokio::sync::mpsc;

use huddle_api::auth::assertion::IdentityClaims;
use huddle_api::auth::jwks::JwksClient;
use huddle_api::auth::tokens;
use huddle_api::config::Config;
use huddle_api::db::kv::{KeyValueStore, MemoryStore};
use huddle_api::models::workspace::role;
use huddle_api::realtime::writer::Frame;
use huddle_api::realtime::{ConnectionWriter, ResourceKind, Subscription};
use huddle_api::store::{ChatStore, MemoryChatStore};
use huddle_api::AppState;

/// Config for tests: small buffers, fast keep-alives, no sweeper.
pub fn test_config() -> Config {
    Config {
        stream_buffer: 32,
        keepalive_interval: Duration::from_millis(200),
        sweep_interval: None,
        dev_login: true,
        ..Config::default()
    }
}

/// AppState on the in-memory store, so tests need no database.
pub fn test_state() -> AppState {
    test_state_with(test_config())
}

/// AppState with `config`, trusting the [`TestSigningKeys`] for logins.
pub fn test_state_with(config: Config) -> AppState {
    let store: Arc<dyn ChatStore> = Arc::new(MemoryChatStore::new());
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let keys = TestSigningKeys::new();
    AppState::new(store, kv, config)
        .with_jwks(JwksClient::with_static_key(&keys.kid, keys.decoding))
}

/// A fixed Ed25519 key pair standing in for the identity service.
pub struct TestSigningKeys {
    pub kid: String,
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
}

impl TestSigningKeys {
    pub fn new() -> Self {
        Self::from_secret("test-identity", [7u8; 32])
    }

    pub fn from_secret(kid: &str, secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let verifying_key: VerifyingKey = (&signing_key).into();
        Self {
            kid: kid.to_string(),
            encoding: EncodingKey::from_ed_der(&wrap_ed25519_private_pkcs8(&secret)),
            decoding: DecodingKey::from_ed_der(&verifying_key.to_bytes()),
        }
    }

    /// Sign `claims` with this key, naming it in the header.
    pub fn sign(&self, claims: &IdentityClaims) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, claims, &self.encoding).expect("sign assertion")
    }
}

/// PKCS#8 v1 DER for an Ed25519 private key, the form `EncodingKey::from_ed_der` takes.
fn wrap_ed25519_private_pkcs8(secret: &[u8; 32]) -> Vec<u8> {
    let mut der = Vec::with_capacity(48);
    der.extend_from_slice(&[0x30, 0x2e]);
    der.extend_from_slice(&[0x02, 0x01, 0x00]);
    der.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    der.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    der.extend_from_slice(secret);
    der
}

/// Claims the server in `config` accepts for `user_id`, valid for five minutes.
pub fn identity_claims(config: &Config, user_id: &str) -> IdentityClaims {
    let now = chrono::Utc::now().timestamp();
    IdentityClaims {
        iss: config.identity_url.clone(),
        sub: user_id.to_string(),
        aud: config.identity_audience.clone(),
        iat: now,
        exp: now + 300,
        jti: huddle_common::id::prefixed_ulid("jti"),
    }
}

/// A signed assertion for `user_id` that the server in `config` accepts.
pub fn mint_assertion(config: &Config, user_id: &str) -> String {
    TestSigningKeys::new().sign(&identity_claims(config, user_id))
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = huddle_api::routes::router().with_state(state.clone());
    (app, state)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub async fn token_for(state: &AppState, user_id: &str) -> String {
    tokens::issue_pat(state.kv.as_ref(), user_id)
        .await
        .expect("issue token")
}

pub struct TestWorkspace {
    pub workspace_id: String,
    pub general_id: String,
    pub owner_id: String,
    pub owner_token: String,
}

/// A workspace with its general channel, owned by a fresh user.
pub async fn seed_workspace(state: &AppState) -> TestWorkspace {
    let owner_id = huddle_common::id::prefixed_ulid(huddle_common::id::prefix::USER);
    let workspace = state
        .store
        .create_workspace("acme", &owner_id)
        .await
        .expect("create workspace");
    let general = state
        .store
        .find_general_channel(&workspace.id)
        .await
        .expect("find general")
        .expect("general exists");
    let owner_token = token_for(state, &owner_id).await;

    TestWorkspace {
        workspace_id: workspace.id,
        general_id: general.id,
        owner_id,
        owner_token,
    }
}

/// A member of `workspace` other than the owner, with a token.
pub async fn add_member(state: &AppState, workspace_id: &str) -> (String, String) {
    let user_id = huddle_common::id::prefixed_ulid(huddle_common::id::prefix::USER);
    state
        .store
        .add_workspace_member(workspace_id, &user_id, role::MEMBER)
        .await
        .expect("add member");
    let token = token_for(state, &user_id).await;
    (user_id, token)
}

/// Subscribe in-process, bypassing HTTP, to observe what handlers publish.
pub async fn listen(
    state: &AppState,
    kind: ResourceKind,
    resource_id: &str,
    user_id: &str,
) -> (Subscription, mpsc::Receiver<Frame>) {
    let (writer, rx) = ConnectionWriter::new(32);
    let sub = state
        .fanout
        .subscribe(kind, resource_id, user_id, writer)
        .await
        .expect("subscribe");
    (sub, rx)
}

/// Next published event as JSON, if one is queued.
pub fn next_event(rx: &mut mpsc::Receiver<Frame>) -> Option<serde_json::Value> {
    let frame = rx.try_recv().ok()?;
    Some(serde_json::from_str(&frame).expect("event json"))
}
