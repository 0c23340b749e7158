//! Event emission for mutation handlers.
//!
//! Handlers call one of these after their write commits. Each builds the
//! `DomainEvent` from the stored rows and publishes it to every audience that
//! renders the entity: top-level messages live in their channel and in their own
//! thread view (as the root); replies live only in their thread, and the channel
//! learns about them through `THREAD_UPDATED`.

use crate::models::channel::Channel;
use crate::models::message::Message;
use crate::models::reaction::ReactionToggle;

use super::events::{DomainEvent, ResourceKind};
use super::fanout::FanoutEngine;

/// Publish to the views that display `message`.
fn publish_to_message_views(fanout: &FanoutEngine, message: &Message, event: &DomainEvent) {
    match message.thread_id() {
        Some(root_id) => {
            fanout.publish(ResourceKind::Thread, root_id, event);
        }
        None => {
            fanout.publish(ResourceKind::Channel, &message.channel_id, event);
            fanout.publish(ResourceKind::Thread, &message.id, event);
        }
    }
}

fn thread_updated(root_id: &str, replies: Vec<Message>) -> DomainEvent {
    DomainEvent::ThreadUpdated {
        thread_id: root_id.to_string(),
        message_count: replies.len(),
        messages: replies,
    }
}

pub fn message_created(fanout: &FanoutEngine, message: &Message) {
    fanout.publish(
        ResourceKind::Channel,
        &message.channel_id,
        &DomainEvent::NewMessage {
            message: message.clone(),
        },
    );
}

pub fn message_updated(fanout: &FanoutEngine, message: &Message) {
    let event = DomainEvent::MessageUpdated {
        message: message.clone(),
    };
    publish_to_message_views(fanout, message, &event);
}

/// A top-level message was removed, together with its thread.
pub fn message_deleted(fanout: &FanoutEngine, message: &Message) {
    let event = DomainEvent::MessageDeleted {
        message_id: message.id.clone(),
    };
    publish_to_message_views(fanout, message, &event);
}

/// A reply was removed. `remaining` is the thread after the delete.
pub fn thread_reply_deleted(fanout: &FanoutEngine, reply: &Message, remaining: Vec<Message>) {
    let Some(root_id) = reply.thread_id() else {
        return message_deleted(fanout, reply);
    };
    fanout.publish(
        ResourceKind::Thread,
        root_id,
        &DomainEvent::MessageDeleted {
            message_id: reply.id.clone(),
        },
    );
    fanout.publish(
        ResourceKind::Channel,
        &reply.channel_id,
        &thread_updated(root_id, remaining),
    );
}

pub fn reaction_toggled(fanout: &FanoutEngine, message: &Message, toggle: ReactionToggle) {
    let event = DomainEvent::reaction_toggled(message.id.clone(), toggle);
    publish_to_message_views(fanout, message, &event);
}

/// Thread first, then the root's channel.
pub fn thread_reply_added(
    fanout: &FanoutEngine,
    root: &Message,
    reply: &Message,
    replies: Vec<Message>,
) {
    fanout.publish(
        ResourceKind::Thread,
        &root.id,
        &DomainEvent::ThreadMessageAdded {
            message: reply.clone(),
            messages: replies.clone(),
        },
    );
    fanout.publish(
        ResourceKind::Channel,
        &root.channel_id,
        &thread_updated(&root.id, replies),
    );
}

pub fn channel_created(fanout: &FanoutEngine, channel: &Channel) {
    fanout.publish(
        ResourceKind::Workspace,
        &channel.workspace_id,
        &DomainEvent::ChannelCreated {
            channel: channel.clone(),
        },
    );
}

pub fn channel_updated(fanout: &FanoutEngine, channel: &Channel) {
    fanout.publish(
        ResourceKind::Workspace,
        &channel.workspace_id,
        &DomainEvent::ChannelUpdated {
            channel: channel.clone(),
        },
    );
}

/// `general_channel_id` tells clients viewing the deleted channel where to go.
pub fn channel_deleted(
    fanout: &FanoutEngine,
    workspace_id: &str,
    channel_id: &str,
    general_channel_id: Option<String>,
) {
    fanout.publish(
        ResourceKind::Workspace,
        workspace_id,
        &DomainEvent::ChannelDeleted {
            channel_id: channel_id.to_string(),
            general_channel_id,
        },
    );
}

pub fn member_joined(fanout: &FanoutEngine, workspace_id: &str, user_id: &str) {
    fanout.publish(
        ResourceKind::Workspace,
        workspace_id,
        &DomainEvent::MemberJoined {
            workspace_id: workspace_id.to_string(),
            user_id: user_id.to_string(),
        },
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::realtime::fanout::Subscription;
    use crate::realtime::gate::AccessGate;
    use crate::realtime::writer::{ConnectionWriter, Frame};
    use crate::store::{ChatStore, MemoryChatStore};

    struct Views {
        _subs: Vec<Subscription>,
        channel: mpsc::Receiver<Frame>,
        thread: mpsc::Receiver<Frame>,
        workspace: mpsc::Receiver<Frame>,
    }

    async fn setup() -> (FanoutEngine, Arc<MemoryChatStore>, Channel, Message, Views) {
        let store = Arc::new(MemoryChatStore::new());
        let ws = store.create_workspace("acme", "usr_owner").await.unwrap();
        let general = store.find_general_channel(&ws.id).await.unwrap().unwrap();
        let root = store
            .create_message(&general.id, "usr_owner", "root", None)
            .await
            .unwrap();
        let fanout = FanoutEngine::new(AccessGate::new(store.clone()));

        let mut subs = Vec::new();
        let open = |kind: ResourceKind, id: String| {
            let fanout = fanout.clone();
            async move {
                let (writer, rx) = ConnectionWriter::new(16);
                let sub = fanout
                    .subscribe(kind, &id, "usr_owner", writer)
                    .await
                    .unwrap();
                (sub, rx)
            }
        };
        let (s, channel) = open(ResourceKind::Channel, general.id.clone()).await;
        subs.push(s);
        let (s, thread) = open(ResourceKind::Thread, root.id.clone()).await;
        subs.push(s);
        let (s, workspace) = open(ResourceKind::Workspace, ws.id.clone()).await;
        subs.push(s);

        let views = Views {
            _subs: subs,
            channel,
            thread,
            workspace,
        };
        (fanout, store, general, root, views)
    }

    fn next_event(rx: &mut mpsc::Receiver<Frame>) -> Option<Value> {
        let frame = rx.try_recv().ok()?;
        Some(serde_json::from_str(&frame).unwrap())
    }

    #[tokio::test]
    async fn new_message_goes_to_channel_only() {
        let (fanout, store, general, _root, mut views) = setup().await;
        let msg = store
            .create_message(&general.id, "usr_owner", "hello", None)
            .await
            .unwrap();

        message_created(&fanout, &msg);

        let event = next_event(&mut views.channel).unwrap();
        assert_eq!(event["type"], "NEW_MESSAGE");
        assert_eq!(event["message"]["content"], "hello");
        assert!(next_event(&mut views.thread).is_none());
        assert!(next_event(&mut views.workspace).is_none());
    }

    #[tokio::test]
    async fn root_edit_reaches_channel_and_thread() {
        let (fanout, store, _general, root, mut views) = setup().await;
        let edited = store.update_message(&root.id, "edited").await.unwrap();

        message_updated(&fanout, &edited);

        for rx in [&mut views.channel, &mut views.thread] {
            let event = next_event(rx).unwrap();
            assert_eq!(event["type"], "MESSAGE_UPDATED");
            assert_eq!(event["message"]["content"], "edited");
        }
    }

    #[tokio::test]
    async fn reply_reaction_stays_in_thread() {
        let (fanout, store, general, root, mut views) = setup().await;
        let reply = store
            .create_message(&general.id, "usr_owner", "reply", Some(&root.id))
            .await
            .unwrap();
        let toggle = store
            .toggle_reaction(&reply.id, "usr_owner", "+1")
            .await
            .unwrap();

        reaction_toggled(&fanout, &reply, toggle);

        let event = next_event(&mut views.thread).unwrap();
        assert_eq!(event["type"], "REACTION_ADDED");
        assert_eq!(event["messageId"], reply.id.as_str());
        assert_eq!(event["reactions"][0]["emoji"], "+1");
        assert!(next_event(&mut views.channel).is_none());
    }

    #[tokio::test]
    async fn thread_reply_updates_thread_then_channel() {
        let (fanout, store, general, root, mut views) = setup().await;
        let reply = store
            .create_message(&general.id, "usr_owner", "reply", Some(&root.id))
            .await
            .unwrap();
        let replies = store.list_thread_replies(&root.id).await.unwrap();

        thread_reply_added(&fanout, &root, &reply, replies);

        let added = next_event(&mut views.thread).unwrap();
        assert_eq!(added["type"], "THREAD_MESSAGE_ADDED");
        assert_eq!(added["message"]["id"], reply.id.as_str());
        assert_eq!(added["messages"].as_array().unwrap().len(), 1);

        let updated = next_event(&mut views.channel).unwrap();
        assert_eq!(updated["type"], "THREAD_UPDATED");
        assert_eq!(updated["threadId"], root.id.as_str());
        assert_eq!(updated["messageCount"], 1);
    }

    #[tokio::test]
    async fn reply_delete_refreshes_channel_counter() {
        let (fanout, store, general, root, mut views) = setup().await;
        let reply = store
            .create_message(&general.id, "usr_owner", "reply", Some(&root.id))
            .await
            .unwrap();
        store.delete_message(&reply.id).await.unwrap();
        let remaining = store.list_thread_replies(&root.id).await.unwrap();

        thread_reply_deleted(&fanout, &reply, remaining);

        let deleted = next_event(&mut views.thread).unwrap();
        assert_eq!(deleted["type"], "MESSAGE_DELETED");
        assert_eq!(deleted["messageId"], reply.id.as_str());

        let updated = next_event(&mut views.channel).unwrap();
        assert_eq!(updated["type"], "THREAD_UPDATED");
        assert_eq!(updated["messageCount"], 0);
    }

    #[tokio::test]
    async fn channel_lifecycle_goes_to_workspace() {
        let (fanout, store, general, _root, mut views) = setup().await;
        let channel = store
            .create_channel(&general.workspace_id, "random", None)
            .await
            .unwrap();

        channel_created(&fanout, &channel);
        channel_updated(&fanout, &channel);
        channel_deleted(
            &fanout,
            &channel.workspace_id,
            &channel.id,
            Some(general.id.clone()),
        );
        member_joined(&fanout, &general.workspace_id, "usr_new");

        let types: Vec<String> = std::iter::from_fn(|| next_event(&mut views.workspace))
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            types,
            vec![
                "CHANNEL_CREATED",
                "CHANNEL_UPDATED",
                "CHANNEL_DELETED",
                "MEMBER_JOINED"
            ]
        );
        assert!(next_event(&mut views.channel).is_none());
    }
}
