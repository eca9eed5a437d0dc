use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde_json::Value;
use shared::EventId;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::{JoinHandle, JoinSet},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    handler::SystemEvent,
    registry::{HandlerRecord, SystemEventHandlerRegistry},
};
use crate::config::Settings;

enum Delivery {
    Run {
        record: HandlerRecord,
        event: Arc<SystemEvent>,
        handle: DeliveryHandle,
    },
    Barrier(oneshot::Sender<()>),
}

/// Cancels one scheduled `post` delivery. A delivery whose handler has been
/// unregistered everywhere is skipped without cancelling the handle.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    token: CancellationToken,
}

impl DeliveryHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Default)]
pub struct PostReceipt {
    handles: Vec<DeliveryHandle>,
}

impl PostReceipt {
    pub fn scheduled(&self) -> usize {
        self.handles.len()
    }

    pub fn handles(&self) -> &[DeliveryHandle] {
        &self.handles
    }

    pub fn cancel(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub invoked: usize,
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("handler #{position} for `{event_id}` rejected: {source}")]
    Rejected {
        event_id: EventId,
        position: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("handler #{position} for `{event_id}` did not settle within {timeout:?}")]
    TimedOut {
        event_id: EventId,
        position: usize,
        timeout: Duration,
    },
}

pub struct SystemEventDispatcher {
    registry: Arc<SystemEventHandlerRegistry>,
    queue: mpsc::UnboundedSender<Delivery>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    // Applies to `send` only.
    handler_timeout: Option<Duration>,
}

impl SystemEventDispatcher {
    /// Spawns the delivery worker; must be called inside a tokio runtime.
    pub fn start(registry: Arc<SystemEventHandlerRegistry>, settings: &Settings) -> Self {
        let (queue, deliveries) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let handler_timeout = settings.send_handler_timeout();
        let worker = tokio::spawn(run_deliveries(
            Arc::clone(&registry),
            deliveries,
            shutdown.clone(),
        ));

        Self {
            registry,
            queue,
            shutdown,
            worker: Mutex::new(Some(worker)),
            handler_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<SystemEventHandlerRegistry> {
        &self.registry
    }

    /// Schedules handlers in registration order without running any of them.
    /// The first filter miss stops scheduling for the rest of the call.
    /// `Some(0)` schedules nothing.
    pub fn post(
        &self,
        event_id: impl Into<EventId>,
        payload: Value,
        max_handlers: Option<usize>,
    ) -> PostReceipt {
        let event = Arc::new(SystemEvent::new(event_id, payload));
        let candidate = event.as_comparable();
        let limit = max_handlers.unwrap_or(usize::MAX);
        let mut receipt = PostReceipt::default();

        for record in self.registry.prepared_handlers(&event.id, false) {
            if receipt.scheduled() >= limit {
                break;
            }
            if !record.accepts(&candidate) {
                debug!(event_id = %event.id, scheduled = receipt.scheduled(), "filter miss, post stopped");
                break;
            }

            let handle = DeliveryHandle {
                token: CancellationToken::new(),
            };
            let delivery = Delivery::Run {
                record,
                event: Arc::clone(&event),
                handle: handle.clone(),
            };
            if self.queue.send(delivery).is_err() {
                warn!(event_id = %event.id, "dispatcher stopped, dropping post");
                break;
            }
            receipt.handles.push(handle);
        }

        receipt
    }

    /// Runs handlers one at a time, last registered first. Filter misses skip
    /// only that handler. The first failure stops the chain.
    pub async fn send(
        &self,
        event_id: impl Into<EventId>,
        payload: Value,
        max_handlers: Option<usize>,
    ) -> Result<SendOutcome, SendError> {
        let event = SystemEvent::new(event_id, payload);
        let candidate = event.as_comparable();
        let limit = max_handlers.unwrap_or(usize::MAX);
        let mut invoked = 0;

        for (position, record) in self
            .registry
            .prepared_handlers(&event.id, true)
            .into_iter()
            .enumerate()
        {
            if invoked >= limit {
                break;
            }
            // An earlier handler in the chain may have unregistered this one.
            if !record.is_active() || !record.accepts(&candidate) {
                continue;
            }

            let settled = match self.handler_timeout {
                Some(timeout) => time::timeout(timeout, record.handler().handle(&event))
                    .await
                    .map_err(|_| SendError::TimedOut {
                        event_id: event.id.clone(),
                        position,
                        timeout,
                    })?,
                None => record.handler().handle(&event).await,
            };
            settled.map_err(|source| SendError::Rejected {
                event_id: event.id.clone(),
                position,
                source,
            })?;
            invoked += 1;
        }

        debug!(event_id = %event.id, invoked, "send settled");
        Ok(SendOutcome { invoked })
    }

    /// Resolves once every delivery posted before this call has run or been
    /// skipped.
    pub async fn flush(&self) {
        let (done, settled) = oneshot::channel();
        if self.queue.send(Delivery::Barrier(done)).is_ok() {
            let _ = settled.await;
        }
    }

    /// Stops the worker. Handlers still running are aborted and later posts
    /// are dropped.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(error) = worker.await {
                warn!(%error, "delivery worker ended abnormally");
            }
        }
    }
}

impl Drop for SystemEventDispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// Starts deliveries in queue order; each handler body then runs as its own
// task so a slow or waiting handler never holds up later deliveries.
async fn run_deliveries(
    registry: Arc<SystemEventHandlerRegistry>,
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    shutdown: CancellationToken,
) {
    let mut running = JoinSet::new();
    loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(finished) = running.join_next(), if !running.is_empty() => {
                report_finished(finished);
                continue;
            }
            delivery = deliveries.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        match delivery {
            Delivery::Barrier(done) => {
                let mut pending = std::mem::replace(&mut running, JoinSet::new());
                tokio::spawn(async move {
                    while let Some(finished) = pending.join_next().await {
                        report_finished(finished);
                    }
                    let _ = done.send(());
                });
            }
            Delivery::Run {
                record,
                event,
                handle,
            } => {
                tokio::task::yield_now().await;
                if !is_live(&registry, &record, &event, &handle) {
                    debug!(event_id = %event.id, "post delivery skipped before it ran");
                    continue;
                }
                running.spawn(async move {
                    if let Err(error) = record.handler().handle(&event).await {
                        warn!(event_id = %event.id, error = %error, "post handler failed");
                    }
                });
            }
        }
    }
    debug!(in_flight = running.len(), "delivery worker stopped");
}

/// A removed record still delivers while the handler stays registered for
/// the event or the wildcard.
fn is_live(
    registry: &SystemEventHandlerRegistry,
    record: &HandlerRecord,
    event: &SystemEvent,
    handle: &DeliveryHandle,
) -> bool {
    if handle.is_cancelled() {
        return false;
    }
    record.is_active() || registry.is_registered(&event.id, record.handler(), record.owner())
}

fn report_finished(finished: Result<(), tokio::task::JoinError>) {
    if let Err(error) = finished {
        if error.is_panic() {
            warn!(%error, "post handler panicked");
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
