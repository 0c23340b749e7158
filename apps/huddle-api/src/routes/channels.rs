//! Channel endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::models::channel::{dm_name, Channel, GENERAL_CHANNEL};
use crate::permissions;
use crate::realtime::emit;
use crate::store::StoreError;
use crate::AppState;

const MAX_NAME_CHARS: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/workspaces/{workspace_id}/channels",
            get(list_channels).post(create_channel),
        )
        .route("/workspaces/{workspace_id}/dm", post(open_dm))
        .route(
            "/channels/{channel_id}",
            patch(update_channel).delete(delete_channel),
        )
}

/// Channel names are lowercase ASCII letters, digits and dashes. `general` is
/// reserved for the channel every workspace starts with.
fn validate_name(name: Option<&str>) -> Result<String, ApiError> {
    let name = name.map(str::trim).unwrap_or_default();
    let message = if name.is_empty() {
        "Channel name is required"
    } else if name == GENERAL_CHANNEL {
        "Channel name is reserved"
    } else if name.len() > MAX_NAME_CHARS {
        "Channel name must be 100 characters or fewer"
    } else if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        "Channel name may only contain lowercase letters, numbers and dashes"
    } else {
        return Ok(name.to_string());
    };
    Err(ApiError::validation(vec![FieldError {
        field: "name".to_string(),
        message: message.to_string(),
    }]))
}

// ---------------------------------------------------------------------------
// GET /api/v1/workspaces/{workspace_id}/channels
// ---------------------------------------------------------------------------

/// The channels a workspace stream subscriber should show. Clients refetch this
/// after reconnecting, since workspace events missed while offline are gone.
async fn list_channels(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let workspace = permissions::require_member(state.store.as_ref(), &workspace_id, &user_id).await?;
    let channels = state
        .store
        .list_workspace_channels(&workspace.id)
        .await?
        .into_iter()
        .filter(|c| c.visible_to(&user_id))
        .collect();
    Ok(Json(channels))
}

// ---------------------------------------------------------------------------
// POST /api/v1/workspaces/{workspace_id}/channels
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

async fn create_channel(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let workspace = permissions::require_member(state.store.as_ref(), &workspace_id, &user_id).await?;
    let name = validate_name(body.name.as_deref())?;
    let description = body
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let channel = state
        .store
        .create_channel(&workspace.id, &name, description)
        .await
        .map_err(|err| match err {
            StoreError::Conflict => ApiError::conflict("A channel with that name already exists"),
            err => err.into(),
        })?;

    emit::channel_created(&state.fanout, &channel);

    Ok((StatusCode::CREATED, Json(channel)))
}

// ---------------------------------------------------------------------------
// POST /api/v1/workspaces/{workspace_id}/dm
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDmRequest {
    pub user_id: Option<String>,
}

/// Get or create the DM channel between the caller and `userId`. Both must be
/// workspace members. 201 when the channel is new, 200 when it already existed.
async fn open_dm(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<OpenDmRequest>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let other_id = body.user_id.as_deref().map(str::trim).unwrap_or_default();
    if other_id.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "userId".to_string(),
            message: "User id is required".to_string(),
        }]));
    }

    let workspace = permissions::require_member(state.store.as_ref(), &workspace_id, &user_id).await?;
    if !state.store.is_workspace_member(&workspace.id, other_id).await? {
        return Err(ApiError::forbidden("That user is not a member of this workspace"));
    }

    let (channel, created) = state
        .store
        .find_or_create_dm(&workspace.id, &dm_name(&user_id, other_id))
        .await?;

    if !created {
        return Ok((StatusCode::OK, Json(channel)));
    }
    tracing::info!(channel_id = %channel.id, workspace_id = %workspace.id, "dm channel created");
    emit::channel_created(&state.fanout, &channel);
    Ok((StatusCode::CREATED, Json(channel)))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/channels/{channel_id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
}

async fn update_channel(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(body): Json<UpdateChannelRequest>,
) -> Result<Json<Channel>, ApiError> {
    let channel = permissions::accessible_channel(state.store.as_ref(), &channel_id, &user_id).await?;
    if channel.is_general() {
        return Err(ApiError::forbidden("The general channel cannot be renamed"));
    }
    if channel.is_dm() {
        return Err(ApiError::forbidden("Direct message channels cannot be renamed"));
    }
    let name = validate_name(body.name.as_deref())?;

    let channel = state
        .store
        .rename_channel(&channel.id, &name)
        .await
        .map_err(|err| match err {
            StoreError::Conflict => ApiError::conflict("A channel with that name already exists"),
            err => err.into(),
        })?;

    emit::channel_updated(&state.fanout, &channel);

    Ok(Json(channel))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/channels/{channel_id}
// ---------------------------------------------------------------------------

async fn delete_channel(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let channel = permissions::accessible_channel(state.store.as_ref(), &channel_id, &user_id).await?;
    if channel.is_general() {
        return Err(ApiError::forbidden("The general channel cannot be deleted"));
    }

    state.store.delete_channel(&channel.id).await?;

    let general_id = state
        .store
        .find_general_channel(&channel.workspace_id)
        .await?
        .map(|general| general.id);
    emit::channel_deleted(&state.fanout, &channel.workspace_id, &channel.id, general_id);

    Ok(StatusCode::NO_CONTENT)
}
