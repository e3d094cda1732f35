use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::subscription::{ChannelSpec, OnChange, SubscribeError, Subscription};

const DEFAULT_CAPACITY: usize = 256;

/// Row-level operation that produced a change event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a channel reacts to (`insert|update|delete|*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventFilter {
    #[default]
    #[serde(rename = "*")]
    All,
    Insert,
    Update,
    Delete,
}

impl EventFilter {
    pub fn matches(self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Insert => kind == ChangeKind::Insert,
            EventFilter::Update => kind == ChangeKind::Update,
            EventFilter::Delete => kind == ChangeKind::Delete,
        }
    }
}

/// One batch of row changes on a single table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    /// Number of rows touched by the write; subscribers are notified once per event.
    pub rows: usize,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind, rows: usize) -> Self {
        Self {
            table: table.into(),
            kind,
            rows,
        }
    }
}

/// Fan-out bus carrying change events from a backend to its subscribers.
///
/// Channel ids are tracked while their subscription is alive so two views
/// cannot share one id by accident.
#[derive(Clone, Debug)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
    active: Arc<Mutex<HashSet<String>>>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Emit an event to all subscribers.
    ///
    /// Emission is best-effort; having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            table = %event.table,
            kind = ?event.kind,
            rows = event.rows,
            subscribers = self.tx.receiver_count(),
            "publishing change event"
        );
        let _ = self.tx.send(event);
    }

    /// Open a change subscription for the tables named in `spec`.
    ///
    /// Must be called from within a tokio runtime: the listener runs as a
    /// spawned task until the returned handle is released or dropped.
    pub fn subscribe(
        &self,
        spec: ChannelSpec,
        on_change: OnChange,
    ) -> Result<Subscription, SubscribeError> {
        if spec.watched_tables().is_empty() {
            return Err(SubscribeError::NoTables {
                channel: spec.id().to_string(),
            });
        }

        {
            let mut active = self.active.lock();
            if !active.insert(spec.id().to_string()) {
                return Err(SubscribeError::ChannelInUse {
                    channel: spec.id().to_string(),
                });
            }
        }

        // Receiver is created before returning so no event published after
        // this call can be missed.
        let rx = self.tx.subscribe();
        Ok(Subscription::spawn(spec, rx, on_change, self.active.clone()))
    }

    /// Number of channels currently subscribed.
    pub fn active_channels(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_active(&self, channel: &str) -> bool {
        self.active.lock().contains(channel)
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_filter_matches_every_kind() {
        for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            assert!(EventFilter::All.matches(kind));
        }
        assert!(EventFilter::Delete.matches(ChangeKind::Delete));
        assert!(!EventFilter::Delete.matches(ChangeKind::Insert));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = ChangeBus::default();
        bus.publish(ChangeEvent::new("posts", ChangeKind::Insert, 1));
        assert_eq!(bus.active_channels(), 0);
    }

    #[test]
    fn filter_parses_wire_names() {
        let filter: EventFilter = serde_json::from_str("\"update\"").unwrap();
        assert_eq!(filter, EventFilter::Update);
        let wildcard: EventFilter = serde_json::from_str("\"*\"").unwrap();
        assert_eq!(wildcard, EventFilter::All);
    }
}
