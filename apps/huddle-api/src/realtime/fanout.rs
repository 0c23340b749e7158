//! Subscription orchestration and event dispatch.
//!
//! Every handler goes through [`FanoutEngine`]: stream handlers subscribe, mutation
//! handlers publish. Each resource kind has its own [`SubscriptionRegistry`], so a
//! thread id can never receive a channel's events.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use huddle_common::id::{prefix, PrefixedId};
use tokio::task::JoinHandle;
use tokio::time;

use super::events::{DomainEvent, ResourceKind};
use super::gate::{AccessGate, SubscribeError};
use super::registry::SubscriptionRegistry;
use super::writer::{encode_frame, ConnectionWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Closed,
}

/// Handle for one admitted stream.
///
/// Dropping the handle unsubscribes, so the transport ties it to the response
/// body: when the client goes away the body is dropped and the writer detaches.
pub struct Subscription {
    id: String,
    kind: ResourceKind,
    resource_id: String,
    writer_id: Arc<str>,
    registry: Arc<SubscriptionRegistry>,
    closed: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn writer_id(&self) -> &str {
        &self.writer_id
    }

    /// `Closed` once unsubscribed, or once the writer was pruned after a failed push.
    pub fn state(&self) -> SubscriptionState {
        if self.closed.load(Ordering::Acquire)
            || !self.registry.has_writer(&self.resource_id, &self.writer_id)
        {
            SubscriptionState::Closed
        } else {
            SubscriptionState::Active
        }
    }

    /// Detach the writer. Returns `false` if the subscription was already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let removed = self.registry.remove(&self.resource_id, &self.writer_id);
        tracing::debug!(
            subscription_id = %self.id,
            kind = %self.kind,
            resource_id = %self.resource_id,
            was_attached = removed,
            "subscription closed"
        );
        true
    }
}

impl PrefixedId for Subscription {
    const PREFIX: &'static str = prefix::SUBSCRIPTION;
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("resource_id", &self.resource_id)
            .field("writer_id", &self.writer_id)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// Process-wide fan-out hub. Cheap to clone; lives in `AppState`.
#[derive(Clone)]
pub struct FanoutEngine {
    gate: AccessGate,
    channels: Arc<SubscriptionRegistry>,
    threads: Arc<SubscriptionRegistry>,
    workspaces: Arc<SubscriptionRegistry>,
}

impl FanoutEngine {
    pub fn new(gate: AccessGate) -> Self {
        Self {
            gate,
            channels: Arc::new(SubscriptionRegistry::new(ResourceKind::Channel)),
            threads: Arc::new(SubscriptionRegistry::new(ResourceKind::Thread)),
            workspaces: Arc::new(SubscriptionRegistry::new(ResourceKind::Workspace)),
        }
    }

    pub fn registry(&self, kind: ResourceKind) -> &Arc<SubscriptionRegistry> {
        match kind {
            ResourceKind::Channel => &self.channels,
            ResourceKind::Thread => &self.threads,
            ResourceKind::Workspace => &self.workspaces,
        }
    }

    /// Check access, then attach `writer` under `resource_id`.
    ///
    /// A rejected subscribe registers nothing.
    pub async fn subscribe(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        user_id: &str,
        writer: ConnectionWriter,
    ) -> Result<Subscription, SubscribeError> {
        self.gate.check(kind, resource_id, user_id).await?;

        let registry = self.registry(kind).clone();
        let writer_id = writer.shared_id();
        registry.add(resource_id, writer);

        let subscription = Subscription {
            id: Subscription::generate(),
            kind,
            resource_id: resource_id.to_string(),
            writer_id,
            registry,
            closed: AtomicBool::new(false),
        };
        tracing::debug!(
            subscription_id = %subscription.id,
            %kind,
            resource_id,
            user_id,
            "subscription active"
        );
        Ok(subscription)
    }

    /// Push `event` to every writer currently attached to `resource_id`.
    ///
    /// Never waits on a client. Writers that are gone or whose buffer is full are
    /// detached; the rest still receive the event.
    pub fn publish(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        event: &DomainEvent,
    ) -> PublishReport {
        let registry = self.registry(kind);
        let writers = registry.snapshot(resource_id);
        if writers.is_empty() {
            return PublishReport::default();
        }

        let frame = match encode_frame(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, event = event.name(), "failed to encode event");
                return PublishReport::default();
            }
        };

        let mut report = PublishReport::default();
        for writer in writers {
            match writer.push(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    registry.remove(resource_id, writer.id());
                    report.pruned += 1;
                    tracing::debug!(
                        %kind,
                        resource_id,
                        writer_id = writer.id(),
                        %reason,
                        "pruned writer"
                    );
                }
            }
        }

        tracing::debug!(
            %kind,
            resource_id,
            event = event.name(),
            delivered = report.delivered,
            pruned = report.pruned,
            "event published"
        );
        report
    }

    /// Same as [`Subscription::close`]. Safe to call repeatedly.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        subscription.close()
    }

    /// Detach writers whose stream has already gone away, across all kinds.
    pub fn sweep(&self) -> usize {
        ResourceKind::ALL
            .iter()
            .map(|kind| self.registry(*kind).sweep_closed())
            .sum()
    }

    /// Total attached writers across all kinds.
    pub fn connection_count(&self) -> usize {
        ResourceKind::ALL
            .iter()
            .map(|kind| self.registry(*kind).connection_count())
            .sum()
    }

    /// Run [`sweep`](Self::sweep) every `every` until the runtime shuts down.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.tick().await; // First tick fires immediately; skip it.
            loop {
                ticker.tick().await;
                let pruned = engine.sweep();
                if pruned > 0 {
                    tracing::info!(pruned, "swept idle subscribers");
                }
            }
        })
    }
}
