//! Plain data shared by the coordination crates: identifiers, the component
//! lifecycle record, the route model and the read-only `Model` snapshot.

pub mod component;
pub mod domain;
pub mod error;
pub mod route;

pub use component::{ComponentState, DataMap, Model};
pub use domain::{ComponentId, EventId, OwnerId, Status, StatusFilter};
pub use route::{RouteSegments, RouteState, RouterState};
