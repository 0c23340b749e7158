//! Subscribe-time authorization.

use std::sync::Arc;

use crate::models::channel::Channel;
use crate::models::message::Message;
use crate::models::workspace::Workspace;
use crate::store::{ChatStore, StoreError};

use super::events::ResourceKind;

/// The resource a subscriber was admitted to.
#[derive(Debug, Clone)]
pub enum GrantedResource {
    Channel(Channel),
    /// Keyed by the root message.
    Thread(Message),
    Workspace(Workspace),
}

#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("{0} not found")]
    NotFound(ResourceKind),
    #[error("access to {0} denied")]
    Forbidden(ResourceKind),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Decides whether an identity may observe a resource, using the store's
/// membership rules.
#[derive(Clone)]
pub struct AccessGate {
    store: Arc<dyn ChatStore>,
    workspace_membership_check: bool,
}

impl AccessGate {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            workspace_membership_check: false,
        }
    }

    /// Also require membership for workspace streams. Off by default: any
    /// authenticated user may watch an existing workspace.
    pub fn with_workspace_membership_check(mut self, enabled: bool) -> Self {
        self.workspace_membership_check = enabled;
        self
    }

    pub async fn check(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        user_id: &str,
    ) -> Result<GrantedResource, SubscribeError> {
        match kind {
            ResourceKind::Channel => {
                if let Some(channel) = self
                    .store
                    .find_channel_accessible(resource_id, user_id)
                    .await?
                {
                    return Ok(GrantedResource::Channel(channel));
                }
                if self.store.find_channel(resource_id).await?.is_some() {
                    Err(SubscribeError::Forbidden(kind))
                } else {
                    Err(SubscribeError::NotFound(kind))
                }
            }
            ResourceKind::Thread => {
                if let Some(root) = self
                    .store
                    .find_thread_accessible(resource_id, user_id)
                    .await?
                {
                    return Ok(GrantedResource::Thread(root));
                }
                if self.store.find_message(resource_id).await?.is_some() {
                    Err(SubscribeError::Forbidden(kind))
                } else {
                    Err(SubscribeError::NotFound(kind))
                }
            }
            ResourceKind::Workspace => {
                let workspace = self
                    .store
                    .find_workspace(resource_id)
                    .await?
                    .ok_or(SubscribeError::NotFound(kind))?;
                if self.workspace_membership_check
                    && !self
                        .store
                        .is_workspace_member(&workspace.id, user_id)
                        .await?
                {
                    return Err(SubscribeError::Forbidden(kind));
                }
                Ok(GrantedResource::Workspace(workspace))
            }
        }
    }
}
