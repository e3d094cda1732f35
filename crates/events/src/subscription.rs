use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::change::{ChangeEvent, EventFilter};

/// Callback invoked with no arguments whenever a watched table changes.
pub type OnChange = Arc<dyn Fn() + Send + Sync>;

/// Errors returned when opening a subscription.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("channel '{channel}' watches no tables")]
    NoTables { channel: String },

    #[error("channel '{channel}' is already subscribed")]
    ChannelInUse { channel: String },
}

/// Declaration of a change channel: a caller-chosen id and the tables it watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    id: String,
    tables: Vec<String>,
    filter: EventFilter,
}

impl ChannelSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tables: Vec::new(),
            filter: EventFilter::All,
        }
    }

    /// Watch one more table. Repeated names are ignored.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !self.tables.contains(&table) {
            self.tables.push(table);
        }
        self
    }

    pub fn tables<I, S>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tables.into_iter().fold(self, |spec, table| spec.table(table))
    }

    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn watched_tables(&self) -> &[String] {
        &self.tables
    }

    pub fn watches(&self, event: &ChangeEvent) -> bool {
        self.filter.matches(event.kind) && self.tables.iter().any(|t| *t == event.table)
    }
}

/// Live change subscription.
///
/// `release()` tears the listener down. Dropping an unreleased handle does
/// the same, so a view that goes away never leaks its channel.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    task: Option<JoinHandle<()>>,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Subscription {
    pub(crate) fn spawn(
        spec: ChannelSpec,
        mut rx: broadcast::Receiver<ChangeEvent>,
        on_change: OnChange,
        active: Arc<Mutex<HashSet<String>>>,
    ) -> Self {
        let channel = spec.id().to_string();
        tracing::info!(
            channel = %channel,
            tables = ?spec.watched_tables(),
            "change subscription opened"
        );

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if spec.watches(&event) {
                            tracing::debug!(
                                channel = spec.id(),
                                table = %event.table,
                                kind = ?event.kind,
                                "change notification"
                            );
                            on_change();
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed events collapse into one full re-fetch.
                        tracing::warn!(
                            channel = spec.id(),
                            skipped,
                            "change stream lagged; forcing refresh"
                        );
                        on_change();
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!(channel = spec.id(), "change stream closed");
                        break;
                    }
                }
            }
        });

        Self {
            channel,
            task: Some(task),
            active,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Tear down the change stream for this channel.
    pub fn release(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.active.lock().remove(&self.channel);
            tracing::info!(channel = %self.channel, "change subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::change::{ChangeBus, ChangeKind};

    fn counting_callback() -> (OnChange, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: OnChange = Arc::new(move || {
            let _ = tx.send(());
        });
        (callback, rx)
    }

    async fn expect_notification(rx: &mut mpsc::UnboundedReceiver<()>) {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("notification should arrive")
            .expect("callback channel open");
    }

    async fn expect_silence(rx: &mut mpsc::UnboundedReceiver<()>) {
        // A closed callback channel (listener gone) also counts as silence.
        let outcome = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(!matches!(outcome, Ok(Some(()))), "no notification expected");
    }

    #[tokio::test]
    async fn notifies_once_per_event_regardless_of_row_count() {
        let bus = ChangeBus::default();
        let (callback, mut rx) = counting_callback();
        let _sub = bus
            .subscribe(ChannelSpec::new("products_changes").table("products"), callback)
            .unwrap();

        bus.publish(ChangeEvent::new("products", ChangeKind::Delete, 12));

        expect_notification(&mut rx).await;
        expect_silence(&mut rx).await;
    }

    #[tokio::test]
    async fn shares_one_stream_across_watched_tables() {
        let bus = ChangeBus::default();
        let (callback, mut rx) = counting_callback();
        let _sub = bus
            .subscribe(
                ChannelSpec::new("blog_changes").tables(["posts", "blog_categories"]),
                callback,
            )
            .unwrap();

        bus.publish(ChangeEvent::new("posts", ChangeKind::Insert, 1));
        bus.publish(ChangeEvent::new("services", ChangeKind::Insert, 1));
        bus.publish(ChangeEvent::new("blog_categories", ChangeKind::Update, 1));

        expect_notification(&mut rx).await;
        expect_notification(&mut rx).await;
        expect_silence(&mut rx).await;
    }

    #[tokio::test]
    async fn honours_event_filter() {
        let bus = ChangeBus::default();
        let (callback, mut rx) = counting_callback();
        let _sub = bus
            .subscribe(
                ChannelSpec::new("deletes")
                    .table("posts")
                    .filter(EventFilter::Delete),
                callback,
            )
            .unwrap();

        bus.publish(ChangeEvent::new("posts", ChangeKind::Update, 1));
        expect_silence(&mut rx).await;

        bus.publish(ChangeEvent::new("posts", ChangeKind::Delete, 1));
        expect_notification(&mut rx).await;
    }

    #[tokio::test]
    async fn rejects_duplicate_channel_ids_until_released() {
        let bus = ChangeBus::default();
        let (callback, _rx) = counting_callback();
        let first = bus
            .subscribe(ChannelSpec::new("services_changes").table("services"), callback.clone())
            .unwrap();

        let err = bus
            .subscribe(ChannelSpec::new("services_changes").table("services"), callback.clone())
            .expect_err("duplicate channel must be rejected");
        assert_eq!(
            err,
            SubscribeError::ChannelInUse {
                channel: "services_changes".into()
            }
        );

        first.release();
        assert!(!bus.is_active("services_changes"));
        bus.subscribe(ChannelSpec::new("services_changes").table("services"), callback)
            .expect("id is free again after release");
    }

    #[tokio::test]
    async fn rejects_empty_table_set() {
        let bus = ChangeBus::default();
        let (callback, _rx) = counting_callback();
        let err = bus
            .subscribe(ChannelSpec::new("nothing"), callback)
            .expect_err("empty table set must be rejected");
        assert!(matches!(err, SubscribeError::NoTables { .. }));
        assert_eq!(bus.active_channels(), 0);
    }

    #[tokio::test]
    async fn released_subscription_stops_notifying() {
        let bus = ChangeBus::default();
        let (callback, mut rx) = counting_callback();
        let sub = bus
            .subscribe(ChannelSpec::new("posts_changes").table("posts"), callback)
            .unwrap();
        sub.release();

        bus.publish(ChangeEvent::new("posts", ChangeKind::Insert, 1));
        expect_silence(&mut rx).await;
    }

    #[tokio::test]
    async fn dropping_handle_releases_channel() {
        let bus = ChangeBus::default();
        let (callback, _rx) = counting_callback();
        {
            let _sub = bus
                .subscribe(ChannelSpec::new("scoped").table("posts"), callback)
                .unwrap();
            assert!(bus.is_active("scoped"));
        }
        assert!(!bus.is_active("scoped"));
    }
}
