use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use predicate::Comparable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::EventId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub id: EventId,
    pub payload: Value,
}

impl SystemEvent {
    pub fn new(id: impl Into<EventId>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// The `{event_id, payload}` value handler filters are evaluated against.
    pub fn as_comparable(&self) -> Comparable {
        Comparable::Map(
            [
                ("event_id".to_string(), Comparable::from(self.id.as_str())),
                ("payload".to_string(), Comparable::from(&self.payload)),
            ]
            .into_iter()
            .collect(),
        )
    }
}

/// A subscriber. The returned result is the settle signal `send` chains on;
/// `post` only logs it.
#[async_trait]
pub trait SystemEventHandler: Send + Sync {
    async fn handle(&self, event: &SystemEvent) -> anyhow::Result<()>;
}

pub type HandlerRef = Arc<dyn SystemEventHandler>;

/// Handlers are identified by the allocation behind their `Arc`.
pub(crate) fn same_handler(left: &HandlerRef, right: &HandlerRef) -> bool {
    Arc::as_ptr(left) as *const () == Arc::as_ptr(right) as *const ()
}

pub struct FnHandler<F> {
    handler: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> SystemEventHandler for FnHandler<F>
where
    F: Fn(SystemEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &SystemEvent) -> anyhow::Result<()> {
        (self.handler)(event.clone()).await
    }
}

pub fn handler_fn<F, Fut>(handler: F) -> HandlerRef
where
    F: Fn(SystemEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler { handler })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn comparable_form_exposes_id_and_payload() {
        let event = SystemEvent::new("order.saved", json!({ "id": 7 }));
        let candidate = event.as_comparable();
        assert_eq!(candidate.get("event_id"), Some(&Comparable::from("order.saved")));
        assert_eq!(
            candidate.get("payload").and_then(|payload| payload.get("id")),
            Some(&Comparable::from(7))
        );
    }

    #[test]
    fn handler_identity_follows_the_arc() {
        let first = handler_fn(|_| async { anyhow::Ok(()) });
        let alias = Arc::clone(&first);
        let second = handler_fn(|_| async { anyhow::Ok(()) });
        assert!(same_handler(&first, &alias));
        assert!(!same_handler(&first, &second));
    }
}
