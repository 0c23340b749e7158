use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::models::reaction::Reaction;
use crate::permissions;
use crate::realtime::emit;
use crate::AppState;

const MAX_EMOJI_CHARS: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new().route("/messages/{message_id}/reactions", post(toggle_reaction))
}

#[derive(Debug, Deserialize)]
pub struct ToggleReactionRequest {
    pub emoji: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleReactionResponse {
    pub message_id: String,
    pub added: bool,
    pub reactions: Vec<Reaction>,
}

// POST /api/v1/messages/{message_id}/reactions
async fn toggle_reaction(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(body): Json<ToggleReactionRequest>,
) -> Result<Json<ToggleReactionResponse>, ApiError> {
    let (message, _channel) =
        permissions::accessible_message(state.store.as_ref(), &message_id, &user_id).await?;

    let emoji = body.emoji.as_deref().map(str::trim).unwrap_or_default();
    if emoji.is_empty() || emoji.chars().count() > MAX_EMOJI_CHARS {
        return Err(ApiError::validation(vec![FieldError {
            field: "emoji".to_string(),
            message: "Emoji must be 1 to 64 characters".to_string(),
        }]));
    }

    let toggle = state
        .store
        .toggle_reaction(&message.id, &user_id, emoji)
        .await?;

    emit::reaction_toggled(&state.fanout, &message, toggle.clone());

    Ok(Json(ToggleReactionResponse {
        message_id: message.id,
        added: toggle.added,
        reactions: toggle.reactions,
    }))
}
