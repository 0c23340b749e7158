//! Server-sent event endpoints and per-connection stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::AppState;

use super::events::ResourceKind;
use super::fanout::Subscription;
use super::writer::{connected_frame, ConnectionWriter, Frame};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels/{channel_id}/events", get(channel_events))
        .route("/messages/{message_id}/thread/events", get(thread_events))
        .route("/workspaces/{workspace_id}/events", get(workspace_events))
}

async fn channel_events(
    State(state): State<AppState>,
    user: AuthUser,
    Path(channel_id): Path<String>,
) -> Result<Response, ApiError> {
    open_stream(&state, ResourceKind::Channel, &channel_id, &user.user_id, None).await
}

async fn thread_events(
    State(state): State<AppState>,
    user: AuthUser,
    Path(message_id): Path<String>,
) -> Result<Response, ApiError> {
    open_stream(&state, ResourceKind::Thread, &message_id, &user.user_id, None).await
}

async fn workspace_events(
    State(state): State<AppState>,
    user: AuthUser,
    Path(workspace_id): Path<String>,
) -> Result<Response, ApiError> {
    open_stream(
        &state,
        ResourceKind::Workspace,
        &workspace_id,
        &user.user_id,
        Some(connected_frame()),
    )
    .await
}

/// Everything one open stream owns. Dropping it (client gone, body dropped by
/// hyper) drops the subscription, which unsubscribes.
struct StreamState {
    rx: mpsc::Receiver<Frame>,
    subscription: Subscription,
}

async fn open_stream(
    state: &AppState,
    kind: ResourceKind,
    resource_id: &str,
    user_id: &str,
    greeting: Option<Frame>,
) -> Result<Response, ApiError> {
    let (writer, rx) = ConnectionWriter::new(state.config.stream_buffer);
    let subscription = state
        .fanout
        .subscribe(kind, resource_id, user_id, writer)
        .await
        .map_err(|err| {
            tracing::debug!(%kind, resource_id, user_id, error = %err, "stream refused");
            ApiError::from(err)
        })?;

    tracing::info!(
        subscription_id = subscription.id(),
        %kind,
        resource_id,
        user_id,
        "event stream opened"
    );

    let events = stream::unfold(StreamState { rx, subscription }, |mut st| async move {
        match st.rx.recv().await {
            Some(frame) => Some((frame, st)),
            None => {
                // Pruned by publish or the sweeper; the client reconnects.
                tracing::debug!(
                    subscription_id = st.subscription.id(),
                    "event stream closed by server"
                );
                None
            }
        }
    });

    let body = stream::iter(greeting)
        .chain(events)
        .map(|frame| Ok::<_, Infallible>(Event::default().data(&*frame)));

    let keep_alive = KeepAlive::new()
        .interval(state.config.keepalive_interval)
        .text("keep-alive");
    Ok(Sse::new(body).keep_alive(keep_alive).into_response())
}
