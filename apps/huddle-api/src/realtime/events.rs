//! Resource kinds and the domain events pushed over event streams.

use std::fmt;

use serde::Serialize;

use crate::models::channel::Channel;
use crate::models::message::Message;
use crate::models::reaction::{Reaction, ReactionToggle};

// ---------------------------------------------------------------------------
// Resource kinds
// ---------------------------------------------------------------------------

/// The three subscription namespaces. A thread is keyed by its root message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Channel,
    Thread,
    Workspace,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Channel, Self::Thread, Self::Workspace];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Thread => "thread",
            Self::Workspace => "workspace",
        }
    }

    /// Capitalized name used in client-facing error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Channel => "Channel",
            Self::Thread => "Thread",
            Self::Workspace => "Workspace",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Domain events
// ---------------------------------------------------------------------------

/// An event pushed to subscribers. Each variant carries a full snapshot of the
/// affected entity.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum DomainEvent {
    NewMessage {
        message: Message,
    },
    MessageUpdated {
        message: Message,
    },
    MessageDeleted {
        message_id: String,
    },
    ReactionAdded {
        message_id: String,
        reactions: Vec<Reaction>,
    },
    ReactionRemoved {
        message_id: String,
        reactions: Vec<Reaction>,
    },
    /// Sent to the thread: the new reply plus every reply in order.
    ThreadMessageAdded {
        message: Message,
        messages: Vec<Message>,
    },
    /// Sent to the root's channel so reply counters refresh without a thread subscription.
    ThreadUpdated {
        thread_id: String,
        message_count: usize,
        messages: Vec<Message>,
    },
    ChannelCreated {
        channel: Channel,
    },
    ChannelUpdated {
        channel: Channel,
    },
    ChannelDeleted {
        channel_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        general_channel_id: Option<String>,
    },
    MemberJoined {
        workspace_id: String,
        user_id: String,
    },
}

impl DomainEvent {
    /// `REACTION_ADDED` or `REACTION_REMOVED`, depending on the toggle outcome.
    pub fn reaction_toggled(message_id: impl Into<String>, toggle: ReactionToggle) -> Self {
        let message_id = message_id.into();
        if toggle.added {
            Self::ReactionAdded {
                message_id,
                reactions: toggle.reactions,
            }
        } else {
            Self::ReactionRemoved {
                message_id,
                reactions: toggle.reactions,
            }
        }
    }

    /// Wire name of the event, as serialized in the `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "NEW_MESSAGE",
            Self::MessageUpdated { .. } => "MESSAGE_UPDATED",
            Self::MessageDeleted { .. } => "MESSAGE_DELETED",
            Self::ReactionAdded { .. } => "REACTION_ADDED",
            Self::ReactionRemoved { .. } => "REACTION_REMOVED",
            Self::ThreadMessageAdded { .. } => "THREAD_MESSAGE_ADDED",
            Self::ThreadUpdated { .. } => "THREAD_UPDATED",
            Self::ChannelCreated { .. } => "CHANNEL_CREATED",
            Self::ChannelUpdated { .. } => "CHANNEL_UPDATED",
            Self::ChannelDeleted { .. } => "CHANNEL_DELETED",
            Self::MemberJoined { .. } => "MEMBER_JOINED",
        }
    }
}
