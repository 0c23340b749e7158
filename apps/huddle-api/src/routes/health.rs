use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::realtime::ResourceKind;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let fanout = &state.fanout;
    Json(json!({
        "status": "ok",
        "streams": {
            "channel": fanout.registry(ResourceKind::Channel).connection_count(),
            "thread": fanout.registry(ResourceKind::Thread).connection_count(),
            "workspace": fanout.registry(ResourceKind::Workspace).connection_count(),
        }
    }))
}
