//! Type-erased comparison and boolean filter primitives used to decide
//! whether an event handler accepts a given event.

mod comparable;
mod path;
mod predicate;

pub use comparable::{Comparable, ComparableKind};
pub use path::{FieldPath, FieldPathError};
pub use predicate::{Condition, Operator, Predicate};
