//! In-memory store of component lifecycle records keyed by
//! `(component id, route path segments)`.
//!
//! Records live in a flat arena. A composite key index gives O(1) lookup and a
//! path-ordered prefix index lets a whole subtree be pruned with one range
//! scan. [`LiteralComponentsState`] is the nested trie form used to import and
//! export the whole store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use shared::{
    route::{join_path, split_path},
    ComponentId, ComponentState,
};
use tracing::debug;

mod literal;
pub mod reduce;

pub use literal::LiteralComponentsState;
pub use reduce::{merge_component_state, reduce, Reduction};

type Slot = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
    id: ComponentId,
    path: Vec<String>,
}

/// Segments may themselves contain `/`; the store keys on the flattened form.
pub fn normalize_segments<S: AsRef<str>>(segments: &[S]) -> Vec<String> {
    segments
        .iter()
        .flat_map(|segment| split_path(segment.as_ref()))
        .collect()
}

#[derive(Debug, Default)]
pub struct ComponentStore {
    slots: Vec<Option<ComponentState>>,
    free: Vec<Slot>,
    index: HashMap<StateKey, Slot>,
    by_path: BTreeMap<Vec<String>, BTreeSet<Slot>>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_literal(tree: LiteralComponentsState) -> Self {
        let mut store = Self::new();
        store.set_state(tree);
        store
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Replaces the whole working state. A record's position in the trie is
    /// authoritative for its path.
    pub fn set_state(&mut self, tree: LiteralComponentsState) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.by_path.clear();

        for (path, mut state) in tree.flatten() {
            state.route_path_segments = path;
            self.write(normalized(state));
        }
    }

    pub fn get_state(&self) -> LiteralComponentsState {
        let mut tree = LiteralComponentsState::default();
        for state in self.iter() {
            tree.insert(&state.route_path_segments, state.clone());
        }
        tree
    }

    pub fn get<S: AsRef<str>>(&self, id: &ComponentId, segments: &[S]) -> Option<&ComponentState> {
        let key = StateKey {
            id: id.clone(),
            path: normalize_segments(segments),
        };
        self.index
            .get(&key)
            .and_then(|slot| self.slots[*slot].as_ref())
    }

    /// Total writer: creates or shallow-merges the record addressed by the
    /// incoming state's id and segments.
    pub fn update(&mut self, incoming: ComponentState) -> ComponentState {
        let incoming = normalized(incoming);
        let prior = self
            .get(&incoming.id, &incoming.route_path_segments)
            .cloned();
        let merged = merge_component_state(prior.as_ref(), incoming);
        self.write(merged.clone());
        merged
    }

    /// Like [`ComponentStore::update`] but routed through the lifecycle rules.
    pub fn apply(&mut self, incoming: ComponentState) -> Reduction {
        let incoming = normalized(incoming);
        let prior = self
            .get(&incoming.id, &incoming.route_path_segments)
            .cloned();
        let reduction = reduce(prior.as_ref(), incoming);
        self.write(reduction.state.clone());
        reduction
    }

    /// Drops every record at `segments` or below. Sibling branches are left
    /// untouched and a second call is a no-op. Returns the removed count.
    pub fn reset<S: AsRef<str>>(&mut self, segments: &[S]) -> usize {
        let prefix = normalize_segments(segments);
        let doomed_paths: Vec<Vec<String>> = self
            .by_path
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .map(|(path, _)| path.clone())
            .collect();

        let mut removed = 0;
        for path in doomed_paths {
            let Some(slots) = self.by_path.remove(&path) else {
                continue;
            };
            for slot in slots {
                if let Some(state) = self.slots[slot].take() {
                    self.index.remove(&StateKey {
                        id: state.id,
                        path: path.clone(),
                    });
                    self.free.push(slot);
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!(prefix = %join_path(&prefix), removed, "pruned component states");
        }
        removed
    }

    pub fn entries_under<S: AsRef<str>>(&self, segments: &[S]) -> Vec<&ComponentState> {
        let prefix = normalize_segments(segments);
        self.by_path
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .flat_map(|(_, slots)| slots.iter())
            .filter_map(|slot| self.slots[*slot].as_ref())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentState> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    fn write(&mut self, state: ComponentState) {
        let key = StateKey {
            id: state.id.clone(),
            path: state.route_path_segments.clone(),
        };
        if let Some(slot) = self.index.get(&key) {
            self.slots[*slot] = Some(state);
            return;
        }

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(state);
                slot
            }
            None => {
                self.slots.push(Some(state));
                self.slots.len() - 1
            }
        };
        self.by_path.entry(key.path.clone()).or_default().insert(slot);
        self.index.insert(key, slot);
    }
}

fn normalized(mut state: ComponentState) -> ComponentState {
    state.route_path_segments = normalize_segments(&state.route_path_segments);
    state.route_path = join_path(&state.route_path_segments);
    state
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
