use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{ComponentId, Status},
    route::{join_path, RouterState},
};

pub type DataMap = serde_json::Map<String, Value>;

/// One component's data-loading lifecycle record for a route location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    pub id: ComponentId,
    pub status: Status,
    pub route_path: String,
    pub route_path_segments: Vec<String>,
    pub navigation_id: u64,
    #[serde(default)]
    pub data: DataMap,
}

impl ComponentState {
    pub fn new(id: impl Into<ComponentId>, route_path_segments: Vec<String>) -> Self {
        Self {
            id: id.into(),
            status: Status::Initialized,
            route_path: join_path(&route_path_segments),
            route_path_segments,
            navigation_id: 0,
            data: DataMap::new(),
        }
    }

    pub fn initialized(
        id: impl Into<ComponentId>,
        route_path_segments: Vec<String>,
        navigation_id: u64,
    ) -> Self {
        Self::new(id, route_path_segments).with_navigation_id(navigation_id)
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_navigation_id(mut self, navigation_id: u64) -> Self {
        self.navigation_id = navigation_id;
        self
    }

    pub fn with_data(mut self, data: DataMap) -> Self {
        self.data = data;
        self
    }

    pub fn with_data_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// True when a newer navigation has happened since this write was stamped.
    /// Discarding superseded writes is left to the caller.
    pub fn is_superseded_by(&self, latest_navigation_id: u64) -> bool {
        self.navigation_id < latest_navigation_id
    }
}

/// Read-only snapshot pairing a component record with the router state that
/// was active when it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    component: ComponentState,
    router: Option<RouterState>,
}

impl Model {
    pub fn new(component: ComponentState, router: Option<RouterState>) -> Self {
        Self { component, router }
    }

    pub fn component(&self) -> &ComponentState {
        &self.component
    }

    pub fn router(&self) -> Option<&RouterState> {
        self.router.as_ref()
    }

    pub fn id(&self) -> &ComponentId {
        &self.component.id
    }

    pub fn status(&self) -> Status {
        self.component.status
    }

    pub fn data(&self) -> &DataMap {
        &self.component.data
    }

    pub fn into_component(self) -> ComponentState {
        self.component
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_state_derives_route_path_from_segments() {
        let state = ComponentState::new("grid", vec!["orders".into(), "12".into()]);
        assert_eq!(state.route_path, "/orders/12");
        assert_eq!(state.status, Status::Initialized);
        assert!(state.data.is_empty());
    }

    #[test]
    fn superseded_when_navigation_moved_on() {
        let state = ComponentState::initialized("grid", vec![], 3);
        assert!(state.is_superseded_by(4));
        assert!(!state.is_superseded_by(3));
    }

    #[test]
    fn model_serializes_with_component_and_router() {
        let model = Model::new(
            ComponentState::new("grid", vec![]).with_data_entry("rows", json!([1, 2])),
            None,
        );
        let value = serde_json::to_value(&model).expect("json");
        assert_eq!(value["component"]["data"]["rows"], json!([1, 2]));
        assert_eq!(value["component"]["status"], json!("INITIALIZED"));
        assert_eq!(value["router"], Value::Null);
    }
}
