//! Views that keep a fetched list in sync with backend changes.
//!
//! A [`LiveView`] owns one change subscription. Every qualifying event (and
//! every filter change) triggers a full re-fetch; only the most recently
//! requested fetch may replace what the view shows.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use vitrina_events::{ChannelSpec, Subscription};

use crate::error::DataError;
use crate::gateway::Gateway;

/// Produces the full list for a filter value.
pub type Fetcher<P, T> =
    Arc<dyn Fn(P) -> BoxFuture<'static, Result<Vec<T>, DataError>> + Send + Sync>;

/// Wrap an async closure as a [`Fetcher`].
pub fn fetcher<P, T, F, Fut>(f: F) -> Fetcher<P, T>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, DataError>> + Send + 'static,
{
    Arc::new(move |params| f(params).boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    Idle,
    Loading,
    Ready,
    Failed,
    Released,
}

impl ViewState {
    pub fn can_transition(self, next: ViewState) -> bool {
        use ViewState::*;
        match (self, next) {
            (Released, _) => false,
            (_, Released) => true,
            (Idle, Loading) | (Ready, Loading) | (Failed, Loading) => true,
            (Loading, Ready) | (Loading, Failed) => true,
            _ => false,
        }
    }
}

/// What a view currently shows.
#[derive(Debug)]
pub struct ViewSnapshot<T> {
    pub state: ViewState,
    pub items: Arc<Vec<T>>,
    pub error: Option<DataError>,
    /// Ticket of the fetch that produced `items` (0 before any fetch lands).
    pub generation: u64,
}

impl<T> Clone for ViewSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            items: Arc::clone(&self.items),
            error: self.error.clone(),
            generation: self.generation,
        }
    }
}

impl<T> ViewSnapshot<T> {
    fn idle() -> Self {
        Self {
            state: ViewState::Idle,
            items: Arc::new(Vec::new()),
            error: None,
            generation: 0,
        }
    }
}

fn transition<T>(name: &str, snapshot: &mut ViewSnapshot<T>, next: ViewState) -> bool {
    if snapshot.state == next {
        return false;
    }
    if !snapshot.state.can_transition(next) {
        tracing::debug!(view = name, from = ?snapshot.state, to = ?next, "ignored view transition");
        return false;
    }
    snapshot.state = next;
    true
}

struct Inner<P, T> {
    name: String,
    fetcher: Fetcher<P, T>,
    params: Mutex<P>,
    latest_ticket: AtomicU64,
    tx: watch::Sender<ViewSnapshot<T>>,
    subscription: Mutex<Option<Subscription>>,
}

impl<P, T> Inner<P, T>
where
    P: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    async fn refresh(&self) -> ViewSnapshot<T> {
        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;

        let mut released = false;
        self.tx.send_if_modified(|snapshot| {
            released = snapshot.state == ViewState::Released;
            transition(&self.name, snapshot, ViewState::Loading)
        });
        if released {
            return self.tx.borrow().clone();
        }

        let params = self.params.lock().clone();
        let result = (self.fetcher)(params).await;

        self.tx.send_if_modified(|snapshot| {
            if snapshot.state == ViewState::Released {
                tracing::debug!(view = %self.name, ticket, "discarded result after release");
                return false;
            }
            if ticket != self.latest_ticket.load(Ordering::SeqCst) || ticket <= snapshot.generation
            {
                tracing::debug!(view = %self.name, ticket, "discarded stale result");
                return false;
            }

            match result {
                Ok(items) => {
                    if !transition(&self.name, snapshot, ViewState::Ready) {
                        return false;
                    }
                    tracing::debug!(view = %self.name, ticket, items = items.len(), "view refreshed");
                    snapshot.items = Arc::new(items);
                    snapshot.error = None;
                }
                Err(err) => {
                    if !transition(&self.name, snapshot, ViewState::Failed) {
                        return false;
                    }
                    tracing::warn!(view = %self.name, ticket, error = %err, "view refresh failed");
                    snapshot.error = Some(err);
                }
            }
            snapshot.generation = ticket;
            true
        });

        self.tx.borrow().clone()
    }

    fn release(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.release();
        }
        self.tx.send_if_modified(|snapshot| transition(&self.name, snapshot, ViewState::Released));
    }
}

/// A list bound to a change channel, re-fetched on every change.
pub struct LiveView<P, T> {
    inner: Arc<Inner<P, T>>,
}

impl<P, T> LiveView<P, T>
where
    P: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Open the subscription, then perform the initial fetch.
    ///
    /// A failed initial fetch still yields a mounted view in `Failed`; only
    /// a rejected subscription is an error.
    pub async fn mount(
        gateway: &Gateway,
        channel: ChannelSpec,
        params: P,
        fetcher: Fetcher<P, T>,
    ) -> Result<Self, DataError> {
        let (tx, _) = watch::channel(ViewSnapshot::idle());
        let inner = Arc::new(Inner {
            name: channel.id().to_string(),
            fetcher,
            params: Mutex::new(params),
            latest_ticket: AtomicU64::new(0),
            tx,
            subscription: Mutex::new(None),
        });

        let weak: Weak<Inner<P, T>> = Arc::downgrade(&inner);
        let subscription = gateway.subscribe(channel, move || {
            if let Some(inner) = weak.upgrade() {
                tokio::spawn(async move {
                    inner.refresh().await;
                });
            }
        })?;
        *inner.subscription.lock() = Some(subscription);

        let view = Self { inner };
        view.refresh().await;
        Ok(view)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Re-fetch with the current filter and return the resulting snapshot.
    pub async fn refresh(&self) -> ViewSnapshot<T> {
        self.inner.refresh().await
    }

    /// Replace the filter and re-fetch.
    pub async fn set_filter(&self, params: P) -> ViewSnapshot<T> {
        *self.inner.params.lock() = params;
        self.inner.refresh().await
    }

    pub fn params(&self) -> P {
        self.inner.params.lock().clone()
    }

    pub fn snapshot(&self) -> ViewSnapshot<T> {
        self.inner.tx.borrow().clone()
    }

    pub fn state(&self) -> ViewState {
        self.inner.tx.borrow().state
    }

    pub fn items(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.inner.tx.borrow().items)
    }

    pub fn watch(&self) -> watch::Receiver<ViewSnapshot<T>> {
        self.inner.tx.subscribe()
    }

    /// Release the subscription. Later results are discarded.
    pub fn release(&self) {
        self.inner.release();
    }
}

impl<P, T> Drop for LiveView<P, T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.inner.subscription.lock().take() {
            subscription.release();
        }
        self.inner.tx.send_if_modified(|snapshot| {
            transition(&self.inner.name, snapshot, ViewState::Released)
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::backend::TableBackend;
    use crate::memory::MemoryBackend;
    use crate::query::{Row, Select};
    use crate::retry::RetryPolicy;

    fn gateway() -> (Gateway, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let gateway = Gateway::new(backend.clone(), RetryPolicy::new(0, 1, 1));
        (gateway, backend)
    }

    fn services_fetcher(gateway: &Gateway) -> Fetcher<(), Row> {
        let gateway = gateway.clone();
        fetcher(move |()| {
            let gateway = gateway.clone();
            async move { gateway.select(&Select::from("services")).await }
        })
    }

    fn row(title: &str) -> Row {
        json!({ "title": title }).as_object().cloned().unwrap()
    }

    async fn wait_for<T, F>(rx: &mut watch::Receiver<ViewSnapshot<T>>, mut done: F)
    where
        F: FnMut(&ViewSnapshot<T>) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if done(&rx.borrow_and_update()) {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("view did not reach expected state");
    }

    #[test]
    fn released_is_terminal() {
        assert!(ViewState::Idle.can_transition(ViewState::Loading));
        assert!(ViewState::Loading.can_transition(ViewState::Failed));
        assert!(ViewState::Failed.can_transition(ViewState::Loading));
        assert!(ViewState::Ready.can_transition(ViewState::Released));
        assert!(!ViewState::Idle.can_transition(ViewState::Ready));
        assert!(!ViewState::Released.can_transition(ViewState::Loading));
    }

    #[tokio::test]
    async fn mount_performs_initial_fetch() {
        let (gateway, backend) = gateway();
        backend.insert("services", vec![row("Mentoría")]).await.unwrap();

        let view = LiveView::mount(
            &gateway,
            ChannelSpec::new("services_changes").table("services"),
            (),
            services_fetcher(&gateway),
        )
        .await
        .unwrap();

        let snapshot = view.snapshot();
        assert_eq!(snapshot.state, ViewState::Ready);
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.generation, 1);
    }

    #[tokio::test]
    async fn refetches_when_watched_table_changes() {
        let (gateway, _) = gateway();
        let view = LiveView::mount(
            &gateway,
            ChannelSpec::new("services_changes").table("services"),
            (),
            services_fetcher(&gateway),
        )
        .await
        .unwrap();
        let mut rx = view.watch();

        gateway.insert("services", row("Talleres")).await.unwrap();

        wait_for(&mut rx, |s| s.state == ViewState::Ready && s.items.len() == 1).await;
    }

    #[tokio::test]
    async fn batch_insert_triggers_one_refetch() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (gateway, _) = gateway();
        let fetches = Arc::new(AtomicUsize::new(0));
        let counting = fetcher({
            let gateway = gateway.clone();
            let fetches = fetches.clone();
            move |()| {
                let gateway = gateway.clone();
                fetches.fetch_add(1, Ordering::SeqCst);
                async move { gateway.select(&Select::from("services")).await }
            }
        });
        let view = LiveView::mount(
            &gateway,
            ChannelSpec::new("services_changes").table("services"),
            (),
            counting,
        )
        .await
        .unwrap();
        let mut rx = view.watch();

        gateway
            .insert_many("services", vec![row("a"), row("b"), row("c")])
            .await
            .unwrap();
        wait_for(&mut rx, |s| s.items.len() == 3).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_items() {
        let (gateway, backend) = gateway();
        backend.insert("services", vec![row("Mentoría")]).await.unwrap();
        let view = LiveView::mount(
            &gateway,
            ChannelSpec::new("services_changes").table("services"),
            (),
            services_fetcher(&gateway),
        )
        .await
        .unwrap();

        backend.fail_next_with(DataError::internal("boom"));
        let snapshot = view.refresh().await;

        assert_eq!(snapshot.state, ViewState::Failed);
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.error, Some(DataError::internal("boom")));

        let snapshot = view.refresh().await;
        assert_eq!(snapshot.state, ViewState::Ready);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn slower_superseded_fetch_is_discarded() {
        let (gateway, _) = gateway();
        let delayed: Fetcher<u64, u64> = fetcher(|delay_ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok::<_, DataError>(vec![delay_ms])
        });
        let view = LiveView::mount(
            &gateway,
            ChannelSpec::new("blog_changes").table("posts"),
            0,
            delayed,
        )
        .await
        .unwrap();

        let (slow, fast) = tokio::join!(view.set_filter(150), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            view.set_filter(1).await
        });

        assert_eq!(fast.items.as_slice(), &[1]);
        assert_eq!(slow.items.as_slice(), &[1]);
        assert_eq!(view.items().as_slice(), &[1]);
        assert_eq!(view.snapshot().generation, 3);
    }

    #[tokio::test]
    async fn released_view_ignores_changes() {
        let (gateway, backend) = gateway();
        let view = LiveView::mount(
            &gateway,
            ChannelSpec::new("products_changes").table("products"),
            (),
            fetcher({
                let gateway = gateway.clone();
                move |()| {
                    let gateway = gateway.clone();
                    async move { gateway.select(&Select::from("products")).await }
                }
            }),
        )
        .await
        .unwrap();

        view.release();
        assert_eq!(view.state(), ViewState::Released);
        assert!(!gateway.changes().is_active("products_changes"));

        let calls = backend.calls();
        gateway.insert("products", row("Libro")).await.unwrap();
        let snapshot = view.refresh().await;

        assert_eq!(snapshot.state, ViewState::Released);
        assert!(snapshot.items.is_empty());
        assert_eq!(backend.calls(), calls + 1);
    }

    #[tokio::test]
    async fn dropping_view_frees_its_channel() {
        let (gateway, _) = gateway();
        let view = LiveView::mount(
            &gateway,
            ChannelSpec::new("services_changes").table("services"),
            (),
            services_fetcher(&gateway),
        )
        .await
        .unwrap();
        assert!(gateway.changes().is_active("services_changes"));

        drop(view);
        assert!(!gateway.changes().is_active("services_changes"));
    }
}
