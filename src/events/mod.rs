//! Lifecycle events
//!
//! Milestones published by the gateway managers and the publisher that
//! delivers them.

mod event;
mod publisher;

pub use event::{LifecycleEvent, LifecycleEventKind};
pub use publisher::{EventPublisher, LifecycleListener};
