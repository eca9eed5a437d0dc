//! Cache of the latest navigation snapshot.
//!
//! The service is an owned context object: hosts create one, hand it to the
//! consumers that need route information, and bracket its lifetime with
//! [`RouterService::initialize`] / [`RouterService::dispose`].

use std::sync::Arc;

use futures::{future, Stream, StreamExt};
use parking_lot::Mutex;
use shared::{RouteState, RouterState};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

const DEFAULT_NAVIGATION_CAPACITY: usize = 256;

pub struct RouterService {
    last: Mutex<Option<RouterState>>,
    state: watch::Sender<Option<RouterState>>,
    // Every navigation in order; `state` only keeps the latest.
    navigations: broadcast::Sender<RouterState>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl Default for RouterService {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterService {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NAVIGATION_CAPACITY)
    }

    /// `capacity` bounds how far a [`RouterService::subscribe_navigations`]
    /// receiver may fall behind before it lags.
    pub fn with_capacity(capacity: usize) -> Self {
        let (state, _) = watch::channel(None);
        let (navigations, _) = broadcast::channel(capacity.max(1));
        Self {
            last: Mutex::new(None),
            state,
            navigations,
            subscription: Mutex::new(None),
        }
    }

    /// Starts consuming `navigations`. Replaces any earlier subscription.
    pub fn initialize<S>(self: &Arc<Self>, navigations: S)
    where
        S: Stream<Item = RouteState> + Send + 'static,
    {
        let router = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut navigations = Box::pin(navigations);
            while let Some(route) = navigations.next().await {
                router.record_navigation(route);
            }
            debug!("navigation source closed");
        });

        if let Some(previous) = self.subscription.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn dispose(&self) {
        if let Some(task) = self.subscription.lock().take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Records one navigation and publishes the resulting snapshot. The
    /// navigation id increases by one per call.
    pub fn record_navigation(&self, route: RouteState) -> RouterState {
        let mut last = self.last.lock();
        let next = match last.as_ref() {
            Some(previous) => previous.next(route),
            None => RouterState::first(route),
        };
        *last = Some(next.clone());
        self.state.send_replace(Some(next.clone()));
        let _ = self.navigations.send(next.clone());

        debug!(
            navigation_id = next.navigation_id,
            route_path = %next.state.route_path(),
            "navigation recorded"
        );
        next
    }

    /// Last known snapshot. May be stale between navigations.
    pub fn snapshot(&self) -> Option<RouterState> {
        self.state.borrow().clone()
    }

    /// `0` until the first navigation.
    pub fn navigation_id(&self) -> u64 {
        self.state
            .borrow()
            .as_ref()
            .map_or(0, |state| state.navigation_id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RouterState>> {
        self.state.subscribe()
    }

    /// Every navigation recorded after this call, none coalesced.
    pub fn subscribe_navigations(&self) -> broadcast::Receiver<RouterState> {
        self.navigations.subscribe()
    }

    /// Live route stream, starting with the current route if there is one.
    pub fn get(&self) -> impl Stream<Item = RouteState> + Send + 'static {
        self.get_state().map(|state| state.state)
    }

    /// Live router-state stream, starting with the current snapshot if there
    /// is one.
    pub fn get_state(&self) -> impl Stream<Item = RouterState> + Send + 'static {
        WatchStream::new(self.state.subscribe()).filter_map(future::ready)
    }
}

impl Drop for RouterService {
    fn drop(&mut self) {
        if let Some(task) = self.subscription.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use super::*;

    #[test]
    fn navigation_ids_increase_per_navigation() {
        let router = RouterService::new();
        assert_eq!(router.navigation_id(), 0);
        assert!(router.snapshot().is_none());

        let first = router.record_navigation(RouteState::from_url("/orders"));
        let second = router.record_navigation(RouteState::from_url("/orders/7"));

        assert_eq!(first.navigation_id, 1);
        assert_eq!(second.navigation_id, 2);
        assert_eq!(router.navigation_id(), 2);
        assert_eq!(
            second.previous.as_ref().map(|p| p.state.route_path()),
            Some("/orders".to_string())
        );
    }

    #[test]
    fn navigation_feed_keeps_every_navigation() {
        let router = RouterService::new();
        let mut feed = router.subscribe_navigations();

        for url in ["/a", "/b", "/a"] {
            router.record_navigation(RouteState::from_url(url));
        }

        let seen: Vec<(u64, String)> = std::iter::from_fn(|| feed.try_recv().ok())
            .map(|state| (state.navigation_id, state.state.route_path()))
            .collect();
        assert_eq!(
            seen,
            vec![(1, "/a".to_string()), (2, "/b".to_string()), (3, "/a".to_string())]
        );
    }

    #[tokio::test]
    async fn stream_starts_with_current_snapshot() {
        let router = RouterService::new();
        router.record_navigation(RouteState::from_url("/a"));

        let mut states = Box::pin(router.get_state());
        let current = states.next().await.expect("current");
        assert_eq!(current.navigation_id, 1);

        router.record_navigation(RouteState::from_url("/b"));
        let next = states.next().await.expect("next");
        assert_eq!(next.state.route_path(), "/b");
    }

    #[tokio::test]
    async fn initialize_consumes_navigation_source_until_disposed() {
        let router = Arc::new(RouterService::new());
        let (tx, rx) = mpsc::unbounded_channel();
        router.initialize(UnboundedReceiverStream::new(rx));
        assert!(router.is_active());

        let mut routes = Box::pin(router.get());
        tx.send(RouteState::from_url("/first")).expect("send");
        let route = routes.next().await.expect("route");
        assert_eq!(route.route_path(), "/first");

        router.dispose();
        assert!(!router.is_active());
        let _ = tx.send(RouteState::from_url("/ignored"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(router.navigation_id(), 1);
    }
}
