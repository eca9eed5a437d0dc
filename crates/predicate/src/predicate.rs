use serde::{Deserialize, Serialize};

use crate::{Comparable, FieldPath, FieldPathError};

static NIL: Comparable = Comparable::Nil;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Equal,
    NotEqual,
    Like,
    LessThan,
    LessThanInclusive,
    GreaterThan,
    GreaterThanInclusive,
    IsNil,
    NotNil,
}

impl Operator {
    /// Relational operators read as `candidate <op> operand`.
    pub fn apply(self, operand: &Comparable, candidate: &Comparable) -> bool {
        match self {
            Operator::Equal => operand.equal(candidate),
            Operator::NotEqual => operand.not_equal(candidate),
            Operator::Like => operand.like(candidate),
            Operator::LessThan => candidate.less_than(operand),
            Operator::LessThanInclusive => candidate.less_than_inclusive(operand),
            Operator::GreaterThan => candidate.greater_than(operand),
            Operator::GreaterThanInclusive => candidate.greater_than_inclusive(operand),
            Operator::IsNil => candidate.is_nil(),
            Operator::NotNil => candidate.not_nil(),
        }
    }
}

/// A single test against the candidate, or against one field of it. A field
/// that does not resolve is treated as nil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldPath>,
    #[serde(default)]
    pub op: Operator,
    #[serde(default)]
    pub operand: Comparable,
}

impl Condition {
    pub fn equal(operand: impl Into<Comparable>) -> Self {
        Self {
            field: None,
            op: Operator::Equal,
            operand: operand.into(),
        }
    }

    pub fn on_field(field: FieldPath, op: Operator, operand: impl Into<Comparable>) -> Self {
        Self {
            field: Some(field),
            op,
            operand: operand.into(),
        }
    }

    pub fn evaluate(&self, candidate: &Comparable) -> bool {
        let target = match &self.field {
            Some(path) => path.resolve(candidate).unwrap_or(&NIL),
            None => candidate,
        };
        self.op.apply(&self.operand, target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Leaf(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Matches candidates equal to `operand`.
    pub fn equal(operand: impl Into<Comparable>) -> Self {
        Predicate::Leaf(Condition::equal(operand))
    }

    pub fn field(
        path: &str,
        op: Operator,
        operand: impl Into<Comparable>,
    ) -> Result<Self, FieldPathError> {
        Ok(Predicate::Leaf(Condition::on_field(path.parse()?, op, operand)))
    }

    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(children.into_iter().collect())
    }

    /// The operand a leaf compares against.
    pub fn comparable(&self) -> Option<&Comparable> {
        match self {
            Predicate::Leaf(condition) => Some(&condition.operand),
            Predicate::And(_) | Predicate::Or(_) => None,
        }
    }

    /// An empty `And` passes, an empty `Or` fails.
    pub fn evaluate(&self, candidate: &Comparable) -> bool {
        match self {
            Predicate::Leaf(condition) => condition.evaluate(candidate),
            Predicate::And(children) => children.iter().all(|child| child.evaluate(candidate)),
            Predicate::Or(children) => children.iter().any(|child| child.evaluate(candidate)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: &str, amount: i64) -> Comparable {
        Comparable::from(json!({ "event_id": id, "payload": { "amount": amount } }))
    }

    #[test]
    fn base_predicate_delegates_to_equal() {
        let predicate = Predicate::equal("saved");
        assert!(predicate.evaluate(&Comparable::from("saved")));
        assert!(!predicate.evaluate(&Comparable::from("Saved")));
        assert!(!predicate.evaluate(&Comparable::from(1)));
    }

    #[test]
    fn or_passes_when_any_child_matches() {
        let p1 = Predicate::field("event_id", Operator::Equal, "saved").expect("p1");
        let p2 = Predicate::field("payload.amount", Operator::GreaterThan, 100).expect("p2");
        let either = Predicate::or([p1.clone(), p2.clone()]);

        assert!(either.evaluate(&event("saved", 1)));
        assert!(either.evaluate(&event("deleted", 500)));
        assert!(!either.evaluate(&event("deleted", 1)));
    }

    #[test]
    fn and_passes_only_when_all_children_match() {
        let p1 = Predicate::field("event_id", Operator::Equal, "saved").expect("p1");
        let p2 = Predicate::field("payload.amount", Operator::GreaterThan, 100).expect("p2");
        let both = Predicate::and([p1, p2]);

        assert!(both.evaluate(&event("saved", 500)));
        assert!(!both.evaluate(&event("saved", 1)));
        assert!(!both.evaluate(&event("deleted", 500)));
    }

    #[test]
    fn empty_compounds() {
        let candidate = event("saved", 1);
        assert!(Predicate::and([]).evaluate(&candidate));
        assert!(!Predicate::or([]).evaluate(&candidate));
    }

    #[test]
    fn missing_field_is_nil() {
        let is_nil = Predicate::field("payload.customer", Operator::IsNil, Comparable::Nil)
            .expect("path");
        let not_nil = Predicate::field("payload.amount", Operator::NotNil, Comparable::Nil)
            .expect("path");
        assert!(is_nil.evaluate(&event("saved", 1)));
        assert!(not_nil.evaluate(&event("saved", 1)));
    }

    #[test]
    fn predicates_deserialize_from_json() {
        let predicate: Predicate = serde_json::from_value(json!({
            "or": [
                { "leaf": { "field": "event_id", "op": "like", "operand": "SAVE" } },
                { "leaf": { "field": "payload.amount", "op": "less_than_inclusive", "operand": 5 } }
            ]
        }))
        .expect("predicate");

        assert!(predicate.evaluate(&event("autosaved", 99)));
        assert!(predicate.evaluate(&event("deleted", 5)));
        assert!(!predicate.evaluate(&event("deleted", 6)));
    }
}
