//! Merge and lifecycle rules applied to every write.

use shared::{ComponentState, Status};
use tracing::warn;

/// Shallow merge of `incoming` over `prior`. Incoming non-empty `data`
/// replaces the stored map; an empty map keeps what was accumulated.
pub fn merge_component_state(
    prior: Option<&ComponentState>,
    incoming: ComponentState,
) -> ComponentState {
    let mut merged = incoming;
    if merged.data.is_empty() {
        if let Some(prior) = prior {
            merged.data = prior.data.clone();
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub state: ComponentState,
    pub previous_status: Option<Status>,
    /// The requested status when it was not reachable from the stored one.
    pub refused: Option<Status>,
}

impl Reduction {
    pub fn is_created(&self) -> bool {
        self.previous_status.is_none()
    }

    pub fn status_changed(&self) -> bool {
        self.previous_status != Some(self.state.status)
    }
}

/// Merge plus the lifecycle table. New entries always start INITIALIZED;
/// an unreachable status keeps the stored one while fields still merge.
pub fn reduce(prior: Option<&ComponentState>, incoming: ComponentState) -> Reduction {
    let requested = incoming.status;
    let mut state = merge_component_state(prior, incoming);
    let previous_status = prior.map(|prior| prior.status);
    let reachable = match previous_status {
        Some(from) => from.can_transition_to(requested),
        None => requested == Status::Initialized,
    };

    let refused = if reachable {
        None
    } else {
        let kept = previous_status.unwrap_or(Status::Initialized);
        warn!(
            component_id = %state.id,
            route_path = %state.route_path,
            from = %kept,
            to = %requested,
            "refusing unreachable component status transition"
        );
        state.status = kept;
        Some(requested)
    };

    Reduction {
        state,
        previous_status,
        refused,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(status: Status) -> ComponentState {
        ComponentState::new("list", vec!["a".into()])
            .with_status(status)
            .with_data_entry("rows", json!([1]))
    }

    #[test]
    fn empty_incoming_data_keeps_prior_data() {
        let prior = stored(Status::Loading);
        let merged = merge_component_state(
            Some(&prior),
            ComponentState::new("list", vec!["a".into()]).with_status(Status::Loaded),
        );
        assert_eq!(merged.status, Status::Loaded);
        assert_eq!(merged.data["rows"], json!([1]));
    }

    #[test]
    fn non_empty_incoming_data_replaces_prior_data() {
        let prior = stored(Status::Loading);
        let merged = merge_component_state(
            Some(&prior),
            ComponentState::new("list", vec!["a".into()]).with_data_entry("total", json!(3)),
        );
        assert!(!merged.data.contains_key("rows"));
        assert_eq!(merged.data["total"], json!(3));
    }

    #[test]
    fn reachable_transition_is_applied() {
        let prior = stored(Status::Loading);
        let reduction = reduce(Some(&prior), stored(Status::Failed));
        assert_eq!(reduction.state.status, Status::Failed);
        assert_eq!(reduction.refused, None);
        assert!(reduction.status_changed());
    }

    #[test]
    fn unreachable_transition_keeps_status_but_merges_data() {
        let prior = stored(Status::Idle);
        let incoming = ComponentState::new("list", vec!["a".into()])
            .with_status(Status::Loaded)
            .with_data_entry("rows", json!([1, 2]));
        let reduction = reduce(Some(&prior), incoming);
        assert_eq!(reduction.state.status, Status::Idle);
        assert_eq!(reduction.refused, Some(Status::Loaded));
        assert_eq!(reduction.state.data["rows"], json!([1, 2]));
    }

    #[test]
    fn new_entries_start_initialized() {
        let reduction = reduce(None, stored(Status::Loaded));
        assert!(reduction.is_created());
        assert_eq!(reduction.state.status, Status::Initialized);
        assert_eq!(reduction.refused, Some(Status::Loaded));

        let reduction = reduce(None, stored(Status::Initialized));
        assert_eq!(reduction.refused, None);
    }
}
