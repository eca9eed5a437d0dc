use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::{ComponentId, ComponentState};

/// Plain-data trie form of the whole store, keyed recursively by route path
/// segment. Only nodes on the way to a populated leaf exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiteralComponentsState {
    #[serde(default)]
    pub components: BTreeMap<ComponentId, ComponentState>,
    #[serde(default)]
    pub route_path_segments: BTreeMap<String, LiteralComponentsState>,
}

impl LiteralComponentsState {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.route_path_segments.is_empty()
    }

    pub fn node(&self, segments: &[String]) -> Option<&LiteralComponentsState> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.route_path_segments.get(segment))
    }

    /// Walks `segments` in order; a miss anywhere is `None`, never an error.
    pub fn component(&self, id: &ComponentId, segments: &[String]) -> Option<&ComponentState> {
        self.node(segments)?.components.get(id)
    }

    pub(crate) fn insert(&mut self, segments: &[String], state: ComponentState) {
        let node = segments.iter().fold(self, |node, segment| {
            node.route_path_segments.entry(segment.clone()).or_default()
        });
        node.components.insert(state.id.clone(), state);
    }

    /// Every component in the trie paired with the path of the node holding it.
    pub(crate) fn flatten(self) -> Vec<(Vec<String>, ComponentState)> {
        let mut out = Vec::new();
        let mut pending = vec![(Vec::new(), self)];
        while let Some((path, node)) = pending.pop() {
            out.extend(
                node.components
                    .into_values()
                    .map(|state| (path.clone(), state)),
            );
            for (segment, child) in node.route_path_segments {
                let mut child_path = path.clone();
                child_path.push(segment);
                pending.push((child_path, child));
            }
        }
        out
    }
}
