//! Realtime fan-out: per-resource subscriber registries, the access gate, the
//! engine that ties them together, and the SSE transport.

pub mod emit;
pub mod events;
pub mod fanout;
pub mod gate;
pub mod registry;
pub mod stream;
pub mod writer;

pub use events::{DomainEvent, ResourceKind};
pub use fanout::{FanoutEngine, PublishReport, Subscription, SubscriptionState};
pub use gate::{AccessGate, GrantedResource, SubscribeError};
pub use registry::SubscriptionRegistry;
pub use writer::ConnectionWriter;
