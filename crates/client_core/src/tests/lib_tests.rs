use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use shared::{ComponentState, EventId, OwnerId, Status};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    done()
}

#[tokio::test]
async fn navigation_stream_drives_router_and_pruning() {
    init_tracing();
    let core = CoordinationCore::new(Settings::default());
    let (navigate, navigations) = mpsc::unbounded_channel();
    core.initialize(UnboundedReceiverStream::new(navigations));
    let mut routes = core.router().get();

    navigate.send(RouteState::from_url("/orders/open")).expect("send route");
    let route = routes.next().await.expect("first route");
    assert_eq!(route.route_path(), "/orders/open");

    let list = core
        .components()
        .init("list", &route)
        .first()
        .await
        .expect("model")
        .into_component();
    assert_eq!(list.navigation_id, 1);

    navigate.send(RouteState::from_url("/invoices")).expect("send route");
    let components = Arc::clone(core.components());
    assert!(wait_until(move || components.with_store_snapshot(|store| store.is_empty())).await);
    assert_eq!(core.router().navigation_id(), 2);
    assert!(!core.components().is_current(&list));

    core.dispose().await;
    assert!(!core.router().is_active());
}

#[tokio::test]
async fn handlers_can_react_to_component_lifecycle() {
    init_tracing();
    let core = CoordinationCore::new(Settings::default());
    let components = Arc::clone(core.components());
    let owner = OwnerId::next();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let recorder = {
        let seen = Arc::clone(&seen);
        let components = Arc::clone(&components);
        handler_fn(move |event| {
            let seen = Arc::clone(&seen);
            let components = Arc::clone(&components);
            async move {
                let state: ComponentState = serde_json::from_value(event.payload)?;
                let stored = components.update(state.with_status(Status::Loaded));
                seen.lock().push(stored.status);
                anyhow::Ok(())
            }
        })
    };
    core.registry()
        .register(&[EventId::from("orders.fetched")], recorder, Some(owner), None);

    let state = ComponentState::new("list", vec!["orders".into()]);
    let loaded = components.load(&state);
    let payload = serde_json::to_value(state.with_data_entry("rows", json!([1, 2])))
        .expect("serialize state");
    let outcome = core
        .dispatcher()
        .send("orders.fetched", payload, None)
        .await
        .expect("send");

    assert_eq!(outcome.invoked, 1);
    let model = loaded.first().await.expect("loaded");
    assert_eq!(model.status(), Status::Loaded);
    assert_eq!(model.data().get("rows"), Some(&json!([1, 2])));
    assert_eq!(*seen.lock(), vec![Status::Loaded]);

    assert_eq!(core.registry().unregister_owner(owner), 1);
    core.dispose().await;
}
