use std::{cmp::Ordering, collections::BTreeMap};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparableKind {
    Nil,
    Bool,
    Number,
    Text,
    List,
    Map,
}

/// A value that can be ordered against another value of the same kind.
///
/// `compare` is total: values of different kinds always compare as
/// [`Ordering::Less`], in both directions, and are never reported equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Comparable {
    #[default]
    Nil,
    Bool(bool),
    /// Integral numbers keep full precision; ids above 2^53 stay distinct.
    Integer(i128),
    Number(f64),
    Text(String),
    List(Vec<Comparable>),
    Map(BTreeMap<String, Comparable>),
}

impl Comparable {
    pub fn kind(&self) -> ComparableKind {
        match self {
            Comparable::Nil => ComparableKind::Nil,
            Comparable::Bool(_) => ComparableKind::Bool,
            Comparable::Integer(_) | Comparable::Number(_) => ComparableKind::Number,
            Comparable::Text(_) => ComparableKind::Text,
            Comparable::List(_) => ComparableKind::List,
            Comparable::Map(_) => ComparableKind::Map,
        }
    }

    pub fn compare(&self, other: &Comparable) -> Ordering {
        match (self, other) {
            (Comparable::Nil, Comparable::Nil) => Ordering::Equal,
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Integer(a), Comparable::Integer(b)) => a.cmp(b),
            (Comparable::Integer(a), Comparable::Number(b)) => compare_floats(*a as f64, *b),
            (Comparable::Number(a), Comparable::Integer(b)) => compare_floats(*a, *b as f64),
            (Comparable::Number(a), Comparable::Number(b)) => compare_floats(*a, *b),
            (Comparable::Text(a), Comparable::Text(b)) => a.cmp(b),
            (Comparable::List(a), Comparable::List(b)) => {
                for (left, right) in a.iter().zip(b) {
                    match left.compare(right) {
                        Ordering::Equal => continue,
                        unequal => return unequal,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Comparable::Map(a), Comparable::Map(b)) => {
                for ((left_key, left), (right_key, right)) in a.iter().zip(b) {
                    match left_key.cmp(right_key).then_with(|| left.compare(right)) {
                        Ordering::Equal => continue,
                        unequal => return unequal,
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Less,
        }
    }

    pub fn equal(&self, other: &Comparable) -> bool {
        self.compare(other) == Ordering::Equal
    }

    pub fn not_equal(&self, other: &Comparable) -> bool {
        !self.equal(other)
    }

    /// Looser match with `self` as the pattern: case-insensitive substring
    /// for text, partial object match for maps, and "any element matches"
    /// when a list pattern meets a scalar.
    pub fn like(&self, candidate: &Comparable) -> bool {
        match (self, candidate) {
            (Comparable::Text(pattern), Comparable::Text(text)) => text
                .to_lowercase()
                .contains(&pattern.to_lowercase()),
            (Comparable::List(pattern), Comparable::List(items)) => pattern
                .iter()
                .all(|wanted| items.iter().any(|item| wanted.like(item))),
            (Comparable::List(pattern), scalar) => {
                pattern.iter().any(|wanted| wanted.like(scalar))
            }
            (Comparable::Map(pattern), Comparable::Map(fields)) => {
                pattern.iter().all(|(key, wanted)| {
                    fields.get(key).is_some_and(|field| wanted.like(field))
                })
            }
            _ => self.equal(candidate),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Comparable::Nil)
    }

    pub fn not_nil(&self) -> bool {
        !self.is_nil()
    }

    // Relational operators only order values of the same kind.
    fn ordered(&self, other: &Comparable) -> Option<Ordering> {
        (self.kind() == other.kind()).then(|| self.compare(other))
    }

    pub fn less_than(&self, other: &Comparable) -> bool {
        self.ordered(other) == Some(Ordering::Less)
    }

    pub fn less_than_inclusive(&self, other: &Comparable) -> bool {
        matches!(
            self.ordered(other),
            Some(Ordering::Less | Ordering::Equal)
        )
    }

    pub fn greater_than(&self, other: &Comparable) -> bool {
        self.ordered(other) == Some(Ordering::Greater)
    }

    pub fn greater_than_inclusive(&self, other: &Comparable) -> bool {
        matches!(
            self.ordered(other),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }

    /// Map key or list index lookup.
    pub fn get(&self, key: &str) -> Option<&Comparable> {
        match self {
            Comparable::Map(fields) => fields.get(key),
            Comparable::List(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        }
    }
}

fn compare_floats(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

impl From<bool> for Comparable {
    fn from(value: bool) -> Self {
        Comparable::Bool(value)
    }
}

impl From<f64> for Comparable {
    fn from(value: f64) -> Self {
        Comparable::Number(value)
    }
}

impl From<i64> for Comparable {
    fn from(value: i64) -> Self {
        Comparable::Integer(i128::from(value))
    }
}

impl From<i32> for Comparable {
    fn from(value: i32) -> Self {
        Comparable::Integer(i128::from(value))
    }
}

impl From<u64> for Comparable {
    fn from(value: u64) -> Self {
        Comparable::Integer(i128::from(value))
    }
}

impl From<&str> for Comparable {
    fn from(value: &str) -> Self {
        Comparable::Text(value.to_string())
    }
}

impl From<String> for Comparable {
    fn from(value: String) -> Self {
        Comparable::Text(value)
    }
}

impl<T: Into<Comparable>> From<Vec<T>> for Comparable {
    fn from(values: Vec<T>) -> Self {
        Comparable::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Comparable>> From<Option<T>> for Comparable {
    fn from(value: Option<T>) -> Self {
        value.map_or(Comparable::Nil, Into::into)
    }
}

impl From<&Value> for Comparable {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Comparable::Nil,
            Value::Bool(flag) => Comparable::Bool(*flag),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Comparable::from(int)
                } else if let Some(int) = number.as_u64() {
                    Comparable::from(int)
                } else {
                    number.as_f64().map_or(Comparable::Nil, Comparable::Number)
                }
            }
            Value::String(text) => Comparable::Text(text.clone()),
            Value::Array(items) => Comparable::List(items.iter().map(Comparable::from).collect()),
            Value::Object(fields) => Comparable::Map(
                fields
                    .iter()
                    .map(|(key, field)| (key.clone(), Comparable::from(field)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Comparable {
    fn from(value: Value) -> Self {
        Comparable::from(&value)
    }
}

impl From<Comparable> for Value {
    fn from(value: Comparable) -> Self {
        match value {
            Comparable::Nil => Value::Null,
            Comparable::Bool(flag) => Value::Bool(flag),
            Comparable::Integer(int) => match (i64::try_from(int), u64::try_from(int)) {
                (Ok(int), _) => Value::from(int),
                (_, Ok(int)) => Value::from(int),
                _ => Number::from_f64(int as f64).map_or(Value::Null, Value::Number),
            },
            Comparable::Number(number) => Number::from_f64(number).map_or(Value::Null, Value::Number),
            Comparable::Text(text) => Value::String(text),
            Comparable::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Comparable::Map(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, field)| (key, Value::from(field)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn scalar() -> impl Strategy<Value = Comparable> {
        prop_oneof![
            Just(Comparable::Nil),
            any::<bool>().prop_map(Comparable::Bool),
            (-1.0e6f64..1.0e6).prop_map(Comparable::Number),
            any::<i64>().prop_map(Comparable::from),
            "[a-z]{0,8}".prop_map(Comparable::Text),
        ]
    }

    fn value() -> impl Strategy<Value = Comparable> {
        prop_oneof![
            scalar(),
            prop::collection::vec(scalar(), 0..4).prop_map(Comparable::List),
            prop::collection::btree_map("[a-c]", scalar(), 0..3).prop_map(Comparable::Map),
        ]
    }

    proptest! {
        #[test]
        fn cross_kind_compare_is_always_less(a in value(), b in value()) {
            prop_assume!(a.kind() != b.kind());
            prop_assert_eq!(a.compare(&b), Ordering::Less);
            prop_assert_eq!(b.compare(&a), Ordering::Less);
            prop_assert!(!a.equal(&b));
            prop_assert!(a.not_equal(&b));
        }

        #[test]
        fn same_kind_scalars_are_antisymmetric(a in scalar(), b in scalar()) {
            prop_assume!(a.kind() == b.kind());
            prop_assert_eq!(a.compare(&b), b.compare(&a).reverse());
        }

        #[test]
        fn every_value_equals_itself(a in value()) {
            prop_assert!(a.equal(&a));
            prop_assert!(a.like(&a));
        }
    }

    #[test]
    fn numbers_order_numerically() {
        let two = Comparable::from(2);
        let ten = Comparable::from(10.0);
        assert_eq!(two.compare(&ten), Ordering::Less);
        assert_eq!(ten.compare(&two), Ordering::Greater);
        assert!(two.less_than(&ten));
        assert!(two.less_than_inclusive(&Comparable::from(2)));
        assert!(ten.greater_than_inclusive(&ten));
        assert!(!ten.greater_than(&ten));
    }

    #[test]
    fn large_integers_keep_full_precision() {
        let id = Comparable::from(&json!(9_007_199_254_740_993_u64));
        let neighbour = Comparable::from(&json!(9_007_199_254_740_992_u64));
        assert!(!id.equal(&neighbour));
        assert!(neighbour.less_than(&id));
        assert!(id.equal(&Comparable::from(9_007_199_254_740_993_u64)));
        assert_eq!(Value::from(id), json!(9_007_199_254_740_993_u64));
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert!(Comparable::from(2).equal(&Comparable::from(2.0)));
        assert!(Comparable::from(2).less_than(&Comparable::from(2.5)));
        assert!(Comparable::from(3.5).greater_than(&Comparable::from(3)));
    }

    #[test]
    fn relational_operators_reject_cross_kind() {
        let number = Comparable::from(1);
        let text = Comparable::from("1");
        assert_eq!(number.compare(&text), Ordering::Less);
        assert!(!number.less_than(&text));
        assert!(!number.greater_than(&text));
        assert!(!number.less_than_inclusive(&text));
    }

    #[test]
    fn nil_checks() {
        assert!(Comparable::Nil.is_nil());
        assert!(Comparable::from(Option::<i64>::None).is_nil());
        assert!(Comparable::from(false).not_nil());
        assert!(Comparable::Nil.equal(&Comparable::Nil));
    }

    #[test]
    fn like_is_looser_than_equal() {
        let pattern = Comparable::from("ORDER");
        let text = Comparable::from("order-created");
        assert!(pattern.like(&text));
        assert!(!pattern.equal(&text));

        let partial = Comparable::from(json!({ "kind": "order" }));
        let full = Comparable::from(json!({ "kind": "order", "id": 7 }));
        assert!(partial.like(&full));
        assert!(!partial.equal(&full));
        assert!(!full.like(&partial));
    }

    #[test]
    fn list_pattern_matches_any_element_against_scalar() {
        let pattern = Comparable::from(vec!["saved", "deleted"]);
        assert!(pattern.like(&Comparable::from("deleted")));
        assert!(!pattern.like(&Comparable::from("created")));
        assert!(!Comparable::List(Vec::new()).like(&Comparable::from("x")));
    }

    #[test]
    fn lists_compare_elementwise_then_by_length() {
        let short = Comparable::from(vec![1, 2]);
        let long = Comparable::from(vec![1, 2, 3]);
        let bigger = Comparable::from(vec![1, 3]);
        assert_eq!(short.compare(&long), Ordering::Less);
        assert_eq!(bigger.compare(&long), Ordering::Greater);
    }

    #[test]
    fn json_round_trip_keeps_structure() {
        let original = json!({ "event_id": "saved", "payload": { "ids": [1, 2], "ok": true } });
        let comparable = Comparable::from(&original);
        assert_eq!(comparable.get("payload").and_then(|p| p.get("ok")), Some(&Comparable::Bool(true)));
        assert_eq!(
            comparable.get("payload").and_then(|p| p.get("ids")).and_then(|ids| ids.get("1")),
            Some(&Comparable::Integer(2))
        );
        assert_eq!(Value::from(comparable), original);
    }
}
