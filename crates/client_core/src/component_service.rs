//! Lifecycle orchestration over the component state store.
//!
//! Every write goes through the store's reducer under one lock, and the
//! resulting record is broadcast while that lock is still held so Model
//! streams observe writes in store order.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use shared::{
    route::join_path, ComponentId, ComponentState, Model, RouteState, Status, StatusFilter,
};
use state_store::{normalize_segments, ComponentStore, Reduction};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{config::Settings, model_stream::ModelStream, router_service::RouterService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Init,
    Idle,
    Load,
    Update,
    Custom(String),
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Init => f.write_str("init"),
            ActionKind::Idle => f.write_str("idle"),
            ActionKind::Load => f.write_str("load"),
            ActionKind::Update => f.write_str("update"),
            ActionKind::Custom(kind) => f.write_str(kind),
        }
    }
}

/// Outbound record of a lifecycle write or a custom `(type, snapshot, task)`
/// action, consumed by whatever application store sits outside the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentAction {
    pub kind: ActionKind,
    pub model: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Value>,
}

pub struct ComponentService {
    store: Arc<Mutex<ComponentStore>>,
    router: Arc<RouterService>,
    changes: broadcast::Sender<ComponentState>,
    actions: broadcast::Sender<ComponentAction>,
    default_filter: StatusFilter,
    last_path: Mutex<Option<Vec<String>>>,
    navigation_watch: Mutex<Option<JoinHandle<()>>>,
}

impl ComponentService {
    pub fn new(router: Arc<RouterService>, settings: &Settings) -> Self {
        Self::with_store(router, ComponentStore::new(), settings)
    }

    pub fn with_store(router: Arc<RouterService>, store: ComponentStore, settings: &Settings) -> Self {
        let (changes, _) = broadcast::channel(settings.change_channel_capacity.max(1));
        let (actions, _) = broadcast::channel(settings.action_channel_capacity.max(1));
        Self {
            store: Arc::new(Mutex::new(store)),
            router,
            changes,
            actions,
            default_filter: settings.default_status_filter.clone(),
            last_path: Mutex::new(None),
            navigation_watch: Mutex::new(None),
        }
    }

    /// Prunes component states on every navigation the router records, in
    /// order, so a branch visited only briefly is still released.
    pub fn initialize(self: &Arc<Self>) {
        let mut navigations = self.router.subscribe_navigations();
        if let Some(current) = self.router.snapshot() {
            self.prune_for_navigation(&current.state);
        }

        let service = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                let route = match navigations.recv().await {
                    Ok(state) => Some(state.state),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "navigation feed lagged; pruning against the latest route");
                        None
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(service) = service.upgrade() else {
                    break;
                };
                let route = match route {
                    Some(route) => route,
                    None => match service.router.snapshot() {
                        Some(latest) => latest.state,
                        None => continue,
                    },
                };
                service.prune_for_navigation(&route);
            }
        });

        if let Some(previous) = self.navigation_watch.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn dispose(&self) {
        if let Some(task) = self.navigation_watch.lock().take() {
            task.abort();
        }
    }

    pub fn router(&self) -> &Arc<RouterService> {
        &self.router
    }

    pub fn subscribe_actions(&self) -> broadcast::Receiver<ComponentAction> {
        self.actions.subscribe()
    }

    /// Creates the entry for `(id, route)` on first request, stamped with the
    /// current navigation id. The stream yields the entry in any status.
    pub fn init(&self, id: impl Into<ComponentId>, route: &RouteState) -> ModelStream {
        let id = id.into();
        let path = normalize_segments(&route.path_segments());

        let created = {
            let mut store = self.store.lock();
            if store.get(&id, &path).is_none() {
                let state =
                    ComponentState::initialized(id.clone(), path.clone(), self.router.navigation_id());
                Some(self.commit(&mut store, state))
            } else {
                None
            }
        };

        if let Some(reduction) = created {
            debug!(component_id = %id, route_path = %reduction.state.route_path, "component initialized");
            self.publish(ActionKind::Init, reduction.state, None);
        }

        self.get_model(id, &path, Some(StatusFilter::Any))
    }

    /// Puts the entry back to IDLE. A LOADING entry is left alone until its
    /// load settles.
    pub fn idle(&self, state: &ComponentState) {
        let reduction = {
            let mut store = self.store.lock();
            self.commit(&mut store, state.clone().with_status(Status::Idle))
        };
        if reduction.refused.is_none() {
            self.publish(ActionKind::Idle, reduction.state, None);
        }
    }

    /// Moves the entry to LOADING (via IDLE where the lifecycle requires it)
    /// stamped with the latest navigation id. The stream yields once the
    /// entry is LOADED or FAILED.
    pub fn load(&self, state: &ComponentState) -> ModelStream {
        let navigation_id = self.router.navigation_id();
        let path = normalize_segments(&state.route_path_segments);

        let written = {
            let mut store = self.store.lock();
            let mut written = Vec::with_capacity(2);

            let stored = store.get(&state.id, &path).cloned();
            let needs_idle = match stored.as_ref().map(|stored| stored.status) {
                None => {
                    let created = ComponentState::initialized(state.id.clone(), path.clone(), navigation_id);
                    written.push((ActionKind::Init, self.commit(&mut store, created)));
                    true
                }
                Some(Status::Initialized | Status::Loaded | Status::Failed) => true,
                Some(Status::Idle | Status::Loading) => false,
            };

            if needs_idle {
                let base = stored.unwrap_or_else(|| state.clone());
                let idle = ComponentState {
                    data: Default::default(),
                    ..base
                }
                .with_status(Status::Idle);
                written.push((ActionKind::Idle, self.commit(&mut store, idle)));
            }

            let loading = state
                .clone()
                .with_status(Status::Loading)
                .with_navigation_id(navigation_id);
            written.push((ActionKind::Load, self.commit(&mut store, loading)));
            written
        };

        for (kind, reduction) in written {
            self.publish(kind, reduction.state, None);
        }

        self.get_model(state.id.clone(), &path, Some(StatusFilter::settled()))
    }

    /// Merges `state` into the stored entry. The incoming status is applied
    /// only when the lifecycle allows it; see [`state_store::reduce`].
    pub fn update(&self, state: ComponentState) -> ComponentState {
        let reduction = {
            let mut store = self.store.lock();
            self.commit(&mut store, state)
        };
        let stored = reduction.state.clone();
        self.publish(ActionKind::Update, reduction.state, None);
        stored
    }

    /// `None` for the filter uses the configured default.
    pub fn get_model<S: AsRef<str>>(
        &self,
        id: impl Into<ComponentId>,
        segments: &[S],
        status_filter: Option<StatusFilter>,
    ) -> ModelStream {
        ModelStream::open(
            &self.store,
            &self.changes,
            &self.router,
            id.into(),
            normalize_segments(segments),
            status_filter.unwrap_or_else(|| self.default_filter.clone()),
        )
    }

    /// Current Model in any status, if the entry exists.
    pub fn snapshot<S: AsRef<str>>(&self, id: &ComponentId, segments: &[S]) -> Option<Model> {
        let state = self.store.lock().get(id, segments).cloned()?;
        Some(Model::new(state, self.router.snapshot()))
    }

    /// Publishes a custom action carrying the entry's current snapshot.
    /// Returns `false` when the entry does not exist yet.
    pub fn dispatch_action(
        &self,
        kind: impl Into<String>,
        state: &ComponentState,
        task: Option<Value>,
    ) -> bool {
        let kind = kind.into();
        let Some(model) = self.snapshot(&state.id, &state.route_path_segments) else {
            debug!(
                component_id = %state.id,
                action = %kind,
                "no component state to attach to action; dropping"
            );
            return false;
        };
        self.send_action(ComponentAction {
            kind: ActionKind::Custom(kind),
            model,
            task,
        });
        true
    }

    /// Whether `state` was stamped under the latest navigation.
    pub fn is_current(&self, state: &ComponentState) -> bool {
        !state.is_superseded_by(self.router.navigation_id())
    }

    /// Drops the branch the previous route no longer shares with `route`.
    /// Returns how many records were removed.
    pub fn prune_for_navigation(&self, route: &RouteState) -> usize {
        let next = normalize_segments(&route.path_segments());
        let Some(previous) = self.last_path.lock().replace(next.clone()) else {
            return 0;
        };

        let common = previous
            .iter()
            .zip(&next)
            .take_while(|(left, right)| left == right)
            .count();
        if previous.len() <= common {
            return 0;
        }

        let removed = self.store.lock().reset(&previous[..=common]);
        debug!(
            from = %join_path(&previous),
            to = %join_path(&next),
            removed,
            "pruned unreachable component states"
        );
        removed
    }

    pub fn with_store_snapshot<T>(&self, read: impl FnOnce(&ComponentStore) -> T) -> T {
        read(&self.store.lock())
    }

    fn commit(&self, store: &mut ComponentStore, incoming: ComponentState) -> Reduction {
        let reduction = store.apply(incoming);
        // No receivers is fine; streams subscribe on demand.
        let _ = self.changes.send(reduction.state.clone());
        reduction
    }

    fn publish(&self, kind: ActionKind, state: ComponentState, task: Option<Value>) {
        self.send_action(ComponentAction {
            kind,
            model: Model::new(state, self.router.snapshot()),
            task,
        });
    }

    fn send_action(&self, action: ComponentAction) {
        let _ = self.actions.send(action);
    }
}

impl Drop for ComponentService {
    fn drop(&mut self) {
        if let Some(task) = self.navigation_watch.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/component_service_tests.rs"]
mod tests;
