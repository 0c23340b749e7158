pub mod auth;
pub mod channels;
pub mod health;
pub mod messages;
pub mod reactions;
pub mod threads;
pub mod workspaces;

use axum::Router;

use crate::realtime::stream;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(health::router()).nest(
        "/api/v1",
        auth::router()
            .merge(stream::router())
            .merge(workspaces::router())
            .merge(channels::router())
            .merge(messages::router())
            .merge(threads::router())
            .merge(reactions::router()),
    )
}
