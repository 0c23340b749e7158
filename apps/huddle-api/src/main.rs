use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use huddle_api::config::Config;
use huddle_api::db::kv::{KeyValueStore, MemoryStore};
use huddle_api::store::{ChatStore, MemoryChatStore, PgChatStore};
use huddle_api::AppState;

#[tokio::main]
async fn main() {
    // Env vars may be set externally; .env is optional.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;
    let sweep_interval = config.sweep_interval;

    let store: Arc<dyn ChatStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = huddle_api::db::pool::connect(url).expect("failed to build connection pool");
            Arc::new(PgChatStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryChatStore::new())
        }
    };

    // Session tokens minted by POST /auth/login, plus seen assertion ids.
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    tracing::info!(
        stream_buffer = config.stream_buffer,
        keepalive_secs = config.keepalive_interval.as_secs(),
        workspace_membership_check = config.workspace_membership_check,
        identity_url = %config.identity_url,
        dev_login = config.dev_login,
        "huddle-api configured"
    );

    let state = AppState::new(store, kv, config);

    if let Some(every) = sweep_interval {
        state.fanout.spawn_sweeper(every);
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(huddle_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "huddle-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
