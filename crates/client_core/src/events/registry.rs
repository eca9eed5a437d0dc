use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use predicate::{Comparable, Predicate};
use shared::{EventId, OwnerId};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::handler::{same_handler, HandlerRef};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("no event ids given")]
    NoEventIds,
    #[error("handler is already registered for event `{event_id}` by the same owner")]
    Duplicate { event_id: EventId },
}

/// One registration of a handler under one event id.
#[derive(Clone)]
pub struct HandlerRecord {
    handler: HandlerRef,
    owner: Option<OwnerId>,
    filter: Option<Arc<Predicate>>,
    // Cancelled when this record is removed.
    token: CancellationToken,
}

impl HandlerRecord {
    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn filter(&self) -> Option<&Predicate> {
        self.filter.as_deref()
    }

    /// No filter accepts everything.
    pub fn accepts(&self, candidate: &Comparable) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.evaluate(candidate))
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    fn matches(&self, handler: &HandlerRef, owner: Option<OwnerId>) -> bool {
        same_handler(&self.handler, handler) && owner.map_or(true, |owner| self.owner == Some(owner))
    }
}

impl fmt::Debug for HandlerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("owner", &self.owner)
            .field("filter", &self.filter)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Event id to handler-list table. The wildcard bucket ([`EventId::all`])
/// receives every event.
#[derive(Default)]
pub struct SystemEventHandlerRegistry {
    buckets: RwLock<HashMap<EventId, Vec<HandlerRecord>>>,
}

impl SystemEventHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record per event id. Malformed or duplicate registrations
    /// are logged and skipped. Returns how many records were added.
    pub fn register(
        &self,
        event_ids: &[EventId],
        handler: HandlerRef,
        owner: Option<OwnerId>,
        filter: Option<Predicate>,
    ) -> usize {
        if event_ids.is_empty() {
            warn!(error = %RegistrationError::NoEventIds, "ignoring handler registration");
            return 0;
        }

        let filter = filter.map(Arc::new);
        let mut buckets = self.buckets.write();
        let mut added = 0;
        for event_id in event_ids {
            let bucket = buckets.entry(event_id.clone()).or_default();
            if bucket
                .iter()
                .any(|record| same_handler(&record.handler, &handler) && record.owner == owner)
            {
                let error = RegistrationError::Duplicate {
                    event_id: event_id.clone(),
                };
                warn!(%error, "ignoring handler registration");
                continue;
            }

            bucket.push(HandlerRecord {
                handler: Arc::clone(&handler),
                owner,
                filter: filter.clone(),
                token: CancellationToken::new(),
            });
            added += 1;
        }

        if added > 0 {
            debug!(added, owner = ?owner, "handler registered");
        }
        added
    }

    /// Removes records for `handler` (restricted to `owner` when given).
    /// Unknown handlers are a no-op. Returns how many records were removed.
    pub fn unregister(
        &self,
        event_ids: &[EventId],
        handler: &HandlerRef,
        owner: Option<OwnerId>,
    ) -> usize {
        if event_ids.is_empty() {
            warn!(error = %RegistrationError::NoEventIds, "ignoring handler unregistration");
            return 0;
        }

        let mut buckets = self.buckets.write();
        let mut removed = 0;
        for event_id in event_ids {
            let Some(bucket) = buckets.get_mut(event_id) else {
                continue;
            };
            removed += drain_matching(bucket, |record| record.matches(handler, owner));
            if bucket.is_empty() {
                buckets.remove(event_id);
            }
        }
        removed
    }

    /// Teardown helper: removes every record registered by `owner`.
    pub fn unregister_owner(&self, owner: OwnerId) -> usize {
        let mut buckets = self.buckets.write();
        let mut removed = 0;
        buckets.retain(|_, bucket| {
            removed += drain_matching(bucket, |record| record.owner == Some(owner));
            !bucket.is_empty()
        });
        debug!(owner = owner.0, removed, "owner handlers unregistered");
        removed
    }

    /// Handlers for `event_id` followed by the wildcard bucket, in
    /// registration order. With `for_send` the list comes back in drain
    /// order: last registered first.
    pub fn prepared_handlers(&self, event_id: &EventId, for_send: bool) -> Vec<HandlerRecord> {
        let buckets = self.buckets.read();
        let mut prepared: Vec<HandlerRecord> = buckets.get(event_id).cloned().unwrap_or_default();
        if !event_id.is_wildcard() {
            if let Some(wildcard) = buckets.get(&EventId::all()) {
                prepared.extend(wildcard.iter().cloned());
            }
        }
        if for_send {
            prepared.reverse();
        }
        prepared
    }

    pub fn find_handler_by_reference(
        &self,
        event_id: &EventId,
        handler: &HandlerRef,
        owner: Option<OwnerId>,
    ) -> bool {
        self.buckets
            .read()
            .get(event_id)
            .is_some_and(|bucket| bucket.iter().any(|record| record.matches(handler, owner)))
    }

    /// Whether `handler` would still receive `event_id`, directly or through
    /// the wildcard bucket.
    pub fn is_registered(&self, event_id: &EventId, handler: &HandlerRef, owner: Option<OwnerId>) -> bool {
        self.find_handler_by_reference(event_id, handler, owner)
            || self.find_handler_by_reference(&EventId::all(), handler, owner)
    }

    pub fn handler_count(&self, event_id: &EventId) -> usize {
        self.buckets.read().get(event_id).map_or(0, Vec::len)
    }
}

impl fmt::Debug for SystemEventHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buckets = self.buckets.read();
        let mut counts: Vec<(&str, usize)> = buckets
            .iter()
            .map(|(event_id, bucket)| (event_id.as_str(), bucket.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("SystemEventHandlerRegistry")
            .field("buckets", &counts)
            .finish()
    }
}

fn drain_matching(bucket: &mut Vec<HandlerRecord>, doomed: impl Fn(&HandlerRecord) -> bool) -> usize {
    let before = bucket.len();
    bucket.retain(|record| {
        if doomed(record) {
            record.token.cancel();
            false
        } else {
            true
        }
    });
    before - bucket.len()
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
