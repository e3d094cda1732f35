use std::sync::Arc;

use parking_lot::RwLock;
use vitrina_db::{ChannelSpec, DataError, Fetcher, Gateway, LiveView, ViewState};

/// Holds a module's live view between `start` and `stop`.
pub struct ViewSlot<P, T> {
    view: RwLock<Option<Arc<LiveView<P, T>>>>,
}

impl<P, T> ViewSlot<P, T>
where
    P: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn empty() -> Self {
        Self {
            view: RwLock::new(None),
        }
    }

    pub async fn mount(
        &self,
        gateway: &Gateway,
        channel: ChannelSpec,
        params: P,
        fetcher: Fetcher<P, T>,
    ) -> Result<(), DataError> {
        // The channel id is still held until the previous view lets go of it.
        if let Some(previous) = self.view.write().take() {
            previous.release();
        }

        let view = LiveView::mount(gateway, channel, params, fetcher).await?;
        tracing::info!(view = view.name(), state = ?view.state(), "live view mounted");
        *self.view.write() = Some(Arc::new(view));
        Ok(())
    }

    pub fn current(&self) -> Option<Arc<LiveView<P, T>>> {
        self.view.read().clone()
    }

    pub fn state(&self) -> Option<ViewState> {
        self.current().map(|view| view.state())
    }

    /// Items of a `Ready` view; `None` while loading, failed, or unmounted.
    pub fn ready_items(&self) -> Option<Vec<T>> {
        let view = self.current()?;
        let snapshot = view.snapshot();
        (snapshot.state == ViewState::Ready).then(|| snapshot.items.as_ref().clone())
    }

    /// Full re-fetch, used after a failed admin mutation.
    pub async fn resync(&self) {
        if let Some(view) = self.current() {
            let snapshot = view.refresh().await;
            tracing::debug!(view = view.name(), state = ?snapshot.state, "view resynced");
        }
    }

    pub fn release(&self) {
        if let Some(view) = self.view.write().take() {
            view.release();
            tracing::info!(view = view.name(), "live view released");
        }
    }
}
