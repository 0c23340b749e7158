//! Thread endpoints. A thread is keyed by its root message.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::models::message::Message;
use crate::permissions;
use crate::realtime::emit;
use crate::AppState;

use super::messages::{validate_content, MessageContentRequest};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/messages/{message_id}/thread",
        get(get_thread).post(reply_to_thread),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    pub root: Message,
    pub message_count: usize,
    pub messages: Vec<Message>,
}

async fn thread_root(state: &AppState, message_id: &str, user_id: &str) -> Result<Message, ApiError> {
    let (root, _channel) =
        permissions::accessible_message(state.store.as_ref(), message_id, user_id).await?;
    if root.thread_id().is_some() {
        return Err(ApiError::bad_request("Thread replies cannot have threads"));
    }
    Ok(root)
}

// ---------------------------------------------------------------------------
// GET /api/v1/messages/{message_id}/thread
// ---------------------------------------------------------------------------

async fn get_thread(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let root = thread_root(&state, &message_id, &user_id).await?;
    let messages = state.store.list_thread_replies(&root.id).await?;

    Ok(Json(ThreadResponse {
        root,
        message_count: messages.len(),
        messages,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/messages/{message_id}/thread
// ---------------------------------------------------------------------------

async fn reply_to_thread(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(body): Json<MessageContentRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let root = thread_root(&state, &message_id, &user_id).await?;
    let content = validate_content(body.content.as_deref())?;

    let reply = state
        .store
        .create_message(&root.channel_id, &user_id, &content, Some(&root.id))
        .await?;
    let replies = state.store.list_thread_replies(&root.id).await?;

    emit::thread_reply_added(&state.fanout, &root, &reply, replies);

    Ok((StatusCode::CREATED, Json(reply)))
}
