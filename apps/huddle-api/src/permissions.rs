//! Membership checks shared by the mutation routes.
//!
//! Unlike the stream endpoints, mutation routes answer 403 for an existing
//! resource the caller cannot touch.

use crate::error::ApiError;
use crate::models::channel::Channel;
use crate::models::message::Message;
use crate::models::workspace::Workspace;
use crate::store::ChatStore;

/// The workspace, if it exists and `user_id` belongs to it.
pub async fn require_member(
    store: &dyn ChatStore,
    workspace_id: &str,
    user_id: &str,
) -> Result<Workspace, ApiError> {
    let workspace = store
        .find_workspace(workspace_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Workspace not found"))?;

    if !store.is_workspace_member(&workspace.id, user_id).await? {
        return Err(ApiError::forbidden("You are not a member of this workspace"));
    }
    Ok(workspace)
}

pub async fn accessible_channel(
    store: &dyn ChatStore,
    channel_id: &str,
    user_id: &str,
) -> Result<Channel, ApiError> {
    let channel = store
        .find_channel(channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    if !store.is_workspace_member(&channel.workspace_id, user_id).await? {
        return Err(ApiError::forbidden("You are not a member of this workspace"));
    }
    Ok(channel)
}

/// The message and its channel, when the caller can see that channel.
pub async fn accessible_message(
    store: &dyn ChatStore,
    message_id: &str,
    user_id: &str,
) -> Result<(Message, Channel), ApiError> {
    let message = store
        .find_message(message_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    let channel = accessible_channel(store, &message.channel_id, user_id).await?;
    Ok((message, channel))
}
