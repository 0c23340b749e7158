use async_trait::async_trait;
use chrono::Utc;
use huddle_common::id::{prefix, prefixed_ulid};
use parking_lot::RwLock;

use crate::models::channel::{Channel, GENERAL_CHANNEL, TYPE_DM, TYPE_PUBLIC};
use crate::models::message::Message;
use crate::models::reaction::{Reaction, ReactionToggle};
use crate::models::workspace::{role, Workspace, WorkspaceMember, WorkspaceSummary};

use super::{ChatStore, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    workspaces: Vec<Workspace>,
    members: Vec<WorkspaceMember>,
    channels: Vec<Channel>,
    messages: Vec<Message>,
    reactions: Vec<Reaction>,
}

/// In-memory `ChatStore`. Rows keep insertion order, which doubles as creation order.
#[derive(Default)]
pub struct MemoryChatStore {
    tables: RwLock<Tables>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn channel_name_taken(&self, workspace_id: &str, name: &str) -> bool {
        self.channels
            .iter()
            .any(|c| c.workspace_id == workspace_id && c.name == name)
    }

    fn push_channel(
        &mut self,
        workspace_id: &str,
        name: &str,
        description: Option<&str>,
        type_: &str,
    ) -> Channel {
        let now = Utc::now();
        let channel = Channel {
            id: prefixed_ulid(prefix::CHANNEL),
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            type_: type_.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.channels.push(channel.clone());
        channel
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn find_workspace(&self, workspace_id: &str) -> StoreResult<Option<Workspace>> {
        let tables = self.tables.read();
        Ok(tables.workspaces.iter().find(|w| w.id == workspace_id).cloned())
    }

    async fn is_workspace_member(&self, workspace_id: &str, user_id: &str) -> StoreResult<bool> {
        let tables = self.tables.read();
        Ok(tables
            .members
            .iter()
            .any(|m| m.workspace_id == workspace_id && m.user_id == user_id))
    }

    async fn find_channel(&self, channel_id: &str) -> StoreResult<Option<Channel>> {
        let tables = self.tables.read();
        Ok(tables.channels.iter().find(|c| c.id == channel_id).cloned())
    }

    async fn find_message(&self, message_id: &str) -> StoreResult<Option<Message>> {
        let tables = self.tables.read();
        Ok(tables.messages.iter().find(|m| m.id == message_id).cloned())
    }

    async fn find_general_channel(&self, workspace_id: &str) -> StoreResult<Option<Channel>> {
        let tables = self.tables.read();
        Ok(tables
            .channels
            .iter()
            .find(|c| c.workspace_id == workspace_id && c.is_general())
            .cloned())
    }

    async fn list_thread_replies(&self, root_message_id: &str) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.parent_message_id.as_deref() == Some(root_message_id))
            .cloned()
            .collect())
    }

    async fn list_channel_messages(&self, channel_id: &str, limit: i64) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read();
        let top_level: Vec<&Message> = tables
            .messages
            .iter()
            .filter(|m| m.channel_id == channel_id && m.parent_message_id.is_none())
            .collect();
        let skip = top_level.len().saturating_sub(limit.max(0) as usize);
        Ok(top_level.into_iter().skip(skip).cloned().collect())
    }

    async fn list_user_workspaces(&self, user_id: &str) -> StoreResult<Vec<WorkspaceSummary>> {
        let tables = self.tables.read();
        let mut summaries: Vec<WorkspaceSummary> = tables
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|membership| {
                let workspace = tables
                    .workspaces
                    .iter()
                    .find(|w| w.id == membership.workspace_id)?;
                let member_count = tables
                    .members
                    .iter()
                    .filter(|m| m.workspace_id == workspace.id)
                    .count() as i64;
                Some(WorkspaceSummary {
                    workspace: workspace.clone(),
                    role: membership.role.clone(),
                    member_count,
                })
            })
            .collect();
        summaries.sort_by(|a, b| {
            (&a.workspace.name, &a.workspace.id).cmp(&(&b.workspace.name, &b.workspace.id))
        });
        Ok(summaries)
    }

    async fn list_workspace_channels(&self, workspace_id: &str) -> StoreResult<Vec<Channel>> {
        let tables = self.tables.read();
        Ok(tables
            .channels
            .iter()
            .filter(|c| c.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn list_workspace_members(&self, workspace_id: &str) -> StoreResult<Vec<WorkspaceMember>> {
        let tables = self.tables.read();
        Ok(tables
            .members
            .iter()
            .filter(|m| m.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn create_workspace(&self, name: &str, owner_id: &str) -> StoreResult<Workspace> {
        let now = Utc::now();
        let workspace = Workspace {
            id: prefixed_ulid(prefix::WORKSPACE),
            name: name.to_string(),
            created_at: now,
        };

        let mut tables = self.tables.write();
        tables.workspaces.push(workspace.clone());
        tables.members.push(WorkspaceMember {
            workspace_id: workspace.id.clone(),
            user_id: owner_id.to_string(),
            role: role::OWNER.to_string(),
            joined_at: now,
        });
        tables.push_channel(&workspace.id, GENERAL_CHANNEL, None, TYPE_PUBLIC);
        Ok(workspace)
    }

    async fn add_workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: &str,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if !tables.workspaces.iter().any(|w| w.id == workspace_id) {
            return Err(StoreError::NotFound);
        }
        if tables
            .members
            .iter()
            .any(|m| m.workspace_id == workspace_id && m.user_id == user_id)
        {
            return Ok(false);
        }
        tables.members.push(WorkspaceMember {
            workspace_id: workspace_id.to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
            joined_at: Utc::now(),
        });
        Ok(true)
    }

    async fn create_channel(
        &self,
        workspace_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<Channel> {
        let mut tables = self.tables.write();
        if tables.channel_name_taken(workspace_id, name) {
            return Err(StoreError::Conflict);
        }
        Ok(tables.push_channel(workspace_id, name, description, TYPE_PUBLIC))
    }

    async fn find_or_create_dm(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> StoreResult<(Channel, bool)> {
        let mut tables = self.tables.write();
        let existing = tables
            .channels
            .iter()
            .find(|c| c.workspace_id == workspace_id && c.name == name);
        match existing {
            Some(channel) if channel.is_dm() => Ok((channel.clone(), false)),
            Some(_) => Err(StoreError::Conflict),
            None => Ok((tables.push_channel(workspace_id, name, None, TYPE_DM), true)),
        }
    }

    async fn rename_channel(&self, channel_id: &str, name: &str) -> StoreResult<Channel> {
        let mut tables = self.tables.write();
        let workspace_id = tables
            .channels
            .iter()
            .find(|c| c.id == channel_id)
            .map(|c| c.workspace_id.clone())
            .ok_or(StoreError::NotFound)?;
        if tables
            .channels
            .iter()
            .any(|c| c.workspace_id == workspace_id && c.name == name && c.id != channel_id)
        {
            return Err(StoreError::Conflict);
        }
        let channel = tables
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id)
            .ok_or(StoreError::NotFound)?;
        channel.name = name.to_string();
        channel.updated_at = Utc::now();
        Ok(channel.clone())
    }

    async fn delete_channel(&self, channel_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let Tables {
            channels,
            messages,
            reactions,
            ..
        } = &mut *tables;

        let before = channels.len();
        channels.retain(|c| c.id != channel_id);
        if channels.len() == before {
            return Err(StoreError::NotFound);
        }

        let removed: Vec<String> = messages
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .map(|m| m.id.clone())
            .collect();
        messages.retain(|m| m.channel_id != channel_id);
        reactions.retain(|r| !removed.contains(&r.message_id));
        Ok(())
    }

    async fn create_message(
        &self,
        channel_id: &str,
        user_id: &str,
        content: &str,
        parent_message_id: Option<&str>,
    ) -> StoreResult<Message> {
        let now = Utc::now();
        let message = Message {
            id: prefixed_ulid(prefix::MESSAGE),
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            parent_message_id: parent_message_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.tables.write().messages.push(message.clone());
        Ok(message)
    }

    async fn update_message(&self, message_id: &str, content: &str) -> StoreResult<Message> {
        let mut tables = self.tables.write();
        let message = tables
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(StoreError::NotFound)?;
        message.content = content.to_string();
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn delete_message(&self, message_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let Tables {
            messages,
            reactions,
            ..
        } = &mut *tables;

        let before = messages.len();
        // Replies cascade with their root.
        let removed: Vec<String> = messages
            .iter()
            .filter(|m| m.id == message_id || m.parent_message_id.as_deref() == Some(message_id))
            .map(|m| m.id.clone())
            .collect();
        messages.retain(|m| !removed.contains(&m.id));
        if messages.len() == before {
            return Err(StoreError::NotFound);
        }
        reactions.retain(|r| !removed.contains(&r.message_id));
        Ok(())
    }

    async fn toggle_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> StoreResult<ReactionToggle> {
        let mut tables = self.tables.write();
        if !tables.messages.iter().any(|m| m.id == message_id) {
            return Err(StoreError::NotFound);
        }

        let existing = tables
            .reactions
            .iter()
            .position(|r| r.message_id == message_id && r.user_id == user_id && r.emoji == emoji);

        let added = match existing {
            Some(index) => {
                tables.reactions.remove(index);
                false
            }
            None => {
                tables.reactions.push(Reaction {
                    id: prefixed_ulid(prefix::REACTION),
                    message_id: message_id.to_string(),
                    user_id: user_id.to_string(),
                    emoji: emoji.to_string(),
                    created_at: Utc::now(),
                });
                true
            }
        };

        let reactions = tables
            .reactions
            .iter()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect();

        Ok(ReactionToggle { added, reactions })
    }
}
