//! Table change notifications for Vitrina.
//!
//! Backends publish one [`ChangeEvent`] per write that touched rows. Views
//! open a [`Subscription`] on the [`ChangeBus`] to be told when any of the
//! tables they render has changed, and re-fetch in response.

/// Change event types and the broadcast bus.
pub mod change;
/// Subscription handles and channel declarations.
pub mod subscription;

pub use change::{ChangeBus, ChangeEvent, ChangeKind, EventFilter};
pub use subscription::{ChannelSpec, OnChange, SubscribeError, Subscription};
