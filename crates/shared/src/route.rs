//! Immutable description of the current navigable location.
//!
//! A location is a parent-linked chain of [`RouteSegments`], one per matched
//! route level. [`RouterState`] pairs the leaf of that chain with the
//! navigation counter that produced it.

use std::{collections::BTreeMap, iter, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ParamMap = BTreeMap<String, String>;

/// Splits a route path into its non-empty segments. `"/a//b/"` and `"a/b"`
/// normalize to the same segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_path(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteSegments {
    pub route_path: String,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    #[serde(default)]
    pub params: ParamMap,
    #[serde(default)]
    pub query_params: ParamMap,
    #[serde(default)]
    pub parent: Option<Arc<RouteSegments>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

impl RouteSegments {
    pub fn new(route_path: impl Into<String>) -> Self {
        Self {
            route_path: route_path.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: Arc<RouteSegments>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_config_path(mut self, config_path: impl Into<String>) -> Self {
        self.config_path = Some(config_path.into());
        self
    }

    /// Leaf first, root last.
    pub fn ancestors(&self) -> impl Iterator<Item = &RouteSegments> {
        iter::successors(Some(self), |level| level.parent.as_deref())
    }

    /// Root first, leaf last.
    pub fn chain(&self) -> Vec<&RouteSegments> {
        let mut chain: Vec<_> = self.ancestors().collect();
        chain.reverse();
        chain
    }

    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// Route parameter lookup, nearest level wins.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.ancestors()
            .find_map(|level| level.params.get(name))
            .map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.ancestors()
            .find_map(|level| level.query_params.get(name))
            .map(String::as_str)
    }

    pub fn data_value(&self, key: &str) -> Option<&Value> {
        self.ancestors().find_map(|level| level.data.get(key))
    }

    pub fn path_segments(&self) -> Vec<String> {
        self.chain()
            .into_iter()
            .flat_map(|level| split_path(&level.route_path))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteState {
    pub route_segments: Arc<RouteSegments>,
    pub url: String,
}

impl RouteState {
    pub fn new(leaf: RouteSegments, url: impl Into<String>) -> Self {
        Self {
            route_segments: Arc::new(leaf),
            url: url.into(),
        }
    }

    /// Builds a one-level-per-segment chain from a plain url such as
    /// `/users/42?tab=posts`. Query parameters land on the leaf.
    pub fn from_url(url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };

        let mut leaf = RouteSegments::new("");
        for segment in split_path(path) {
            let parent = Arc::new(leaf);
            leaf = RouteSegments::new(segment).with_parent(parent);
        }

        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                leaf = leaf.with_query_param(name, value);
            }
        }

        Self::new(leaf, url)
    }

    pub fn path_segments(&self) -> Vec<String> {
        self.route_segments.path_segments()
    }

    pub fn route_path(&self) -> String {
        join_path(&self.path_segments())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterState {
    pub state: RouteState,
    pub navigation_id: u64,
    pub navigated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Box<RouterState>>,
}

impl RouterState {
    pub fn first(state: RouteState) -> Self {
        Self {
            state,
            navigation_id: 1,
            navigated_at: Utc::now(),
            previous: None,
        }
    }

    /// The next snapshot in the navigation sequence. Only one level of
    /// history is kept.
    pub fn next(&self, state: RouteState) -> Self {
        let mut previous = self.clone();
        previous.previous = None;
        Self {
            state,
            navigation_id: self.navigation_id + 1,
            navigated_at: Utc::now(),
            previous: Some(Box::new(previous)),
        }
    }

    pub fn path_segments(&self) -> Vec<String> {
        self.state.path_segments()
    }
}
