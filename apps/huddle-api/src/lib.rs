pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod permissions;
pub mod realtime;
pub mod routes;
pub mod store;

use std::sync::Arc;

use auth::jwks::JwksClient;
use config::Config;
use db::kv::KeyValueStore;
use realtime::{AccessGate, FanoutEngine};
use store::ChatStore;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub jwks: JwksClient,
    pub config: Arc<Config>,
    pub fanout: FanoutEngine,
}

impl AppState {
    /// Wire the fan-out engine to `store` using the gate settings in `config`.
    /// Identity keys are fetched from `config.identity_url`.
    pub fn new(store: Arc<dyn ChatStore>, kv: Arc<dyn KeyValueStore>, config: Config) -> Self {
        let gate = AccessGate::new(store.clone())
            .with_workspace_membership_check(config.workspace_membership_check);
        Self {
            store,
            kv,
            jwks: JwksClient::new(&config.identity_url),
            config: Arc::new(config),
            fanout: FanoutEngine::new(gate),
        }
    }

    /// Replace the identity key source.
    pub fn with_jwks(mut self, jwks: JwksClient) -> Self {
        self.jwks = jwks;
        self
    }
}
