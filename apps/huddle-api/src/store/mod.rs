//! Storage collaborator.
//!
//! The realtime core only reads through the access lookups; the mutation
//! handlers use the rest. Two implementations: Postgres via diesel-async, and an
//! in-memory store for tests and database-less local runs.

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::models::channel::Channel;
use crate::models::message::Message;
use crate::models::reaction::ReactionToggle;
use crate::models::workspace::{Workspace, WorkspaceMember, WorkspaceSummary};

pub use memory::MemoryChatStore;
pub use pg::PgChatStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),
    #[error("record not found")]
    NotFound,
    /// A unique key (such as a channel name within its workspace) is taken.
    #[error("record already exists")]
    Conflict,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ChatStore: Send + Sync {
    // -- lookups -----------------------------------------------------------

    async fn find_workspace(&self, workspace_id: &str) -> StoreResult<Option<Workspace>>;

    async fn is_workspace_member(&self, workspace_id: &str, user_id: &str) -> StoreResult<bool>;

    async fn find_channel(&self, channel_id: &str) -> StoreResult<Option<Channel>>;

    async fn find_message(&self, message_id: &str) -> StoreResult<Option<Message>>;

    /// The channel, if it exists and `user_id` belongs to its workspace.
    async fn find_channel_accessible(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Channel>> {
        let Some(channel) = self.find_channel(channel_id).await? else {
            return Ok(None);
        };
        if self.is_workspace_member(&channel.workspace_id, user_id).await? {
            Ok(Some(channel))
        } else {
            Ok(None)
        }
    }

    /// The thread's root message, if it exists and `user_id` belongs to the
    /// workspace owning its channel.
    async fn find_thread_accessible(
        &self,
        message_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Message>> {
        let Some(message) = self.find_message(message_id).await? else {
            return Ok(None);
        };
        match self.find_channel_accessible(&message.channel_id, user_id).await? {
            Some(_) => Ok(Some(message)),
            None => Ok(None),
        }
    }

    /// The oldest channel named `general` in the workspace.
    async fn find_general_channel(&self, workspace_id: &str) -> StoreResult<Option<Channel>>;

    /// Workspaces `user_id` belongs to, by name.
    async fn list_user_workspaces(&self, user_id: &str) -> StoreResult<Vec<WorkspaceSummary>>;

    /// Every channel of the workspace, DMs included, oldest first.
    async fn list_workspace_channels(&self, workspace_id: &str) -> StoreResult<Vec<Channel>>;

    /// Members in join order.
    async fn list_workspace_members(&self, workspace_id: &str) -> StoreResult<Vec<WorkspaceMember>>;

    async fn list_thread_replies(&self, root_message_id: &str) -> StoreResult<Vec<Message>>;

    /// The latest `limit` top-level messages of a channel, oldest first.
    async fn list_channel_messages(&self, channel_id: &str, limit: i64) -> StoreResult<Vec<Message>>;

    // -- mutations ---------------------------------------------------------

    /// Create a workspace with its `general` channel and `owner_id` as owner.
    async fn create_workspace(&self, name: &str, owner_id: &str) -> StoreResult<Workspace>;

    /// Returns `false` when the user was already a member.
    async fn add_workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: &str,
    ) -> StoreResult<bool>;

    /// Fails with [`StoreError::Conflict`] when the name is taken in the workspace.
    async fn create_channel(
        &self,
        workspace_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<Channel>;

    /// The DM channel called `name`, created if absent. The flag is `true` when
    /// this call created it.
    async fn find_or_create_dm(&self, workspace_id: &str, name: &str)
        -> StoreResult<(Channel, bool)>;

    async fn rename_channel(&self, channel_id: &str, name: &str) -> StoreResult<Channel>;

    async fn delete_channel(&self, channel_id: &str) -> StoreResult<()>;

    async fn create_message(
        &self,
        channel_id: &str,
        user_id: &str,
        content: &str,
        parent_message_id: Option<&str>,
    ) -> StoreResult<Message>;

    async fn update_message(&self, message_id: &str, content: &str) -> StoreResult<Message>;

    async fn delete_message(&self, message_id: &str) -> StoreResult<()>;

    /// Add the reaction if absent, remove it otherwise.
    async fn toggle_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> StoreResult<ReactionToggle>;
}
