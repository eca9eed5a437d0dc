use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{future, stream, stream::BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use shared::{ComponentId, ComponentState, Model, StatusFilter};
use state_store::ComponentStore;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

use crate::router_service::RouterService;

/// Continuous stream of [`Model`] snapshots for one `(id, path)` entry,
/// emitting whenever the entry is written with a status the filter accepts.
pub struct ModelStream {
    inner: BoxStream<'static, Model>,
}

impl ModelStream {
    /// Subscribes and reads the current entry under the store lock so no
    /// write is missed or delivered twice.
    pub(crate) fn open(
        store: &Arc<Mutex<ComponentStore>>,
        changes: &broadcast::Sender<ComponentState>,
        router: &Arc<RouterService>,
        id: ComponentId,
        path: Vec<String>,
        filter: StatusFilter,
    ) -> Self {
        let (receiver, current) = {
            let guard = store.lock();
            (changes.subscribe(), guard.get(&id, &path).cloned())
        };

        let head = current
            .filter(|state| filter.matches(state.status))
            .map(|state| Model::new(state, router.snapshot()));

        let store = Arc::clone(store);
        let router = Arc::clone(router);
        let tail = BroadcastStream::new(receiver).filter_map(move |change| {
            let model = match change {
                Ok(state) => (state.id == id
                    && state.route_path_segments == path
                    && filter.matches(state.status))
                .then(|| Model::new(state, router.snapshot())),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(
                        component_id = %id,
                        skipped,
                        "model stream lagged; re-reading current entry"
                    );
                    store
                        .lock()
                        .get(&id, &path)
                        .filter(|state| filter.matches(state.status))
                        .cloned()
                        .map(|state| Model::new(state, router.snapshot()))
                }
            };
            future::ready(model)
        });

        Self {
            inner: stream::iter(head).chain(tail).boxed(),
        }
    }

    /// Resolves with the next matching snapshot, or `None` once the owning
    /// service is gone.
    pub async fn first(mut self) -> Option<Model> {
        self.next().await
    }
}

impl Stream for ModelStream {
    type Item = Model;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
