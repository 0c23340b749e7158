//! Message endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::models::message::Message;
use crate::permissions;
use crate::realtime::emit;
use crate::AppState;

pub const MAX_CONTENT_CHARS: usize = 4000;
const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/channels/{channel_id}/messages",
            post(send_message).get(list_messages),
        )
        .route(
            "/messages/{message_id}",
            patch(edit_message).delete(delete_message),
        )
}

/// Trimmed message body, or a validation error.
pub(crate) fn validate_content(content: Option<&str>) -> Result<String, ApiError> {
    let content = content.map(str::trim).unwrap_or_default();
    let message = if content.is_empty() {
        "Message content is required"
    } else if content.chars().count() > MAX_CONTENT_CHARS {
        "Message content must be 4000 characters or fewer"
    } else {
        return Ok(content.to_string());
    };
    Err(ApiError::validation(vec![FieldError {
        field: "content".to_string(),
        message: message.to_string(),
    }]))
}

#[derive(Debug, Deserialize)]
pub struct MessageContentRequest {
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /api/v1/channels/{channel_id}/messages
// ---------------------------------------------------------------------------

async fn send_message(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(body): Json<MessageContentRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let channel = permissions::accessible_channel(state.store.as_ref(), &channel_id, &user_id).await?;
    let content = validate_content(body.content.as_deref())?;

    let message = state
        .store
        .create_message(&channel.id, &user_id, &content, None)
        .await?;

    emit::message_created(&state.fanout, &message);

    Ok((StatusCode::CREATED, Json(message)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/channels/{channel_id}/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
}

/// Latest top-level messages, oldest first. Clients call this after a stream
/// reconnects to catch up on anything missed.
async fn list_messages(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let channel = permissions::accessible_channel(state.store.as_ref(), &channel_id, &user_id).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let messages = state.store.list_channel_messages(&channel.id, limit).await?;
    Ok(Json(messages))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/messages/{message_id}
// ---------------------------------------------------------------------------

async fn edit_message(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(body): Json<MessageContentRequest>,
) -> Result<Json<Message>, ApiError> {
    let (message, _channel) =
        permissions::accessible_message(state.store.as_ref(), &message_id, &user_id).await?;
    if message.user_id != user_id {
        return Err(ApiError::forbidden("You can only edit your own messages"));
    }
    let content = validate_content(body.content.as_deref())?;

    let updated = state.store.update_message(&message.id, &content).await?;

    emit::message_updated(&state.fanout, &updated);

    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/messages/{message_id}
// ---------------------------------------------------------------------------

async fn delete_message(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let (message, _channel) =
        permissions::accessible_message(state.store.as_ref(), &message_id, &user_id).await?;
    if message.user_id != user_id {
        return Err(ApiError::forbidden("You can only delete your own messages"));
    }

    state.store.delete_message(&message.id).await?;

    match message.thread_id() {
        Some(root_id) => {
            let remaining = state.store.list_thread_replies(root_id).await?;
            emit::thread_reply_deleted(&state.fanout, &message, remaining);
        }
        None => emit::message_deleted(&state.fanout, &message),
    }

    Ok(StatusCode::NO_CONTENT)
}
