//! Client-side coordination core: route-keyed component lifecycle state,
//! the route snapshot cache, and an in-process event bus.

use std::sync::Arc;

use futures::Stream;
use shared::RouteState;

pub mod component_service;
pub mod config;
pub mod events;
mod model_stream;
pub mod router_service;

pub use component_service::{ActionKind, ComponentAction, ComponentService};
pub use config::{load_settings, Settings, SettingsError};
pub use events::{
    handler_fn, DeliveryHandle, HandlerRef, PostReceipt, SendError, SendOutcome, SystemEvent,
    SystemEventDispatcher, SystemEventHandler, SystemEventHandlerRegistry,
};
pub use model_stream::ModelStream;
pub use router_service::RouterService;

/// Owns one instance of every service and wires them together. Hosts build
/// one per application and pass the pieces to whatever needs them.
pub struct CoordinationCore {
    settings: Settings,
    router: Arc<RouterService>,
    components: Arc<ComponentService>,
    registry: Arc<SystemEventHandlerRegistry>,
    dispatcher: SystemEventDispatcher,
}

impl CoordinationCore {
    /// Must be called inside a tokio runtime; the dispatcher spawns its
    /// delivery worker here.
    pub fn new(settings: Settings) -> Self {
        let router = Arc::new(RouterService::with_capacity(settings.change_channel_capacity));
        let components = Arc::new(ComponentService::new(Arc::clone(&router), &settings));
        let registry = Arc::new(SystemEventHandlerRegistry::new());
        let dispatcher = SystemEventDispatcher::start(Arc::clone(&registry), &settings);

        Self {
            settings,
            router,
            components,
            registry,
            dispatcher,
        }
    }

    /// Starts following `navigations` and pruning component state on every
    /// route change.
    pub fn initialize<S>(&self, navigations: S)
    where
        S: Stream<Item = RouteState> + Send + 'static,
    {
        self.components.initialize();
        self.router.initialize(navigations);
        tracing::info!("coordination core initialized");
    }

    pub async fn dispose(&self) {
        self.router.dispose();
        self.components.dispose();
        self.dispatcher.flush().await;
        self.dispatcher.shutdown().await;
        tracing::info!("coordination core disposed");
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&self) -> &Arc<RouterService> {
        &self.router
    }

    pub fn components(&self) -> &Arc<ComponentService> {
        &self.components
    }

    pub fn registry(&self) -> &Arc<SystemEventHandlerRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &SystemEventDispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
