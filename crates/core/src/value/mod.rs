//! Runtime values: cardinality × base type, with Null semantics.
//!
//! A [`Value`] is either Null or carries exactly one cardinality. Containers
//! (multiple, ordered, record) are never empty: the constructors collapse an
//! empty container to [`Value::Null`], so "is this Null?" is a single match.

mod repr;
mod single;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

pub use single::{format_double, FileValue, SingleValue};

// ──────────────────────────────────────────────
// Cardinality and base type
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    Single,
    Multiple,
    Ordered,
    Record,
}

impl Cardinality {
    pub const ALL: [Cardinality; 4] = [
        Cardinality::Single,
        Cardinality::Multiple,
        Cardinality::Ordered,
        Cardinality::Record,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
            Cardinality::Record => "record",
        }
    }

    /// Multiple or ordered.
    pub fn is_container(self) -> bool {
        matches!(self, Cardinality::Multiple | Cardinality::Ordered)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Identifier,
    Boolean,
    Integer,
    Float,
    String,
    Point,
    Pair,
    DirectedPair,
    Duration,
    File,
    Uri,
}

impl BaseType {
    pub const ALL: [BaseType; 11] = [
        BaseType::Identifier,
        BaseType::Boolean,
        BaseType::Integer,
        BaseType::Float,
        BaseType::String,
        BaseType::Point,
        BaseType::Pair,
        BaseType::DirectedPair,
        BaseType::Duration,
        BaseType::File,
        BaseType::Uri,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::Identifier => "identifier",
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Point => "point",
            BaseType::Pair => "pair",
            BaseType::DirectedPair => "directedPair",
            BaseType::Duration => "duration",
            BaseType::File => "file",
            BaseType::Uri => "uri",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Float)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Containers
// ──────────────────────────────────────────────

/// Non-empty, homogeneous element list backing multiple and ordered values.
#[derive(Debug, Clone)]
pub struct Container {
    base_type: BaseType,
    items: Vec<SingleValue>,
}

impl Container {
    pub fn base_type(&self) -> BaseType {
        self.base_type
    }

    pub fn items(&self) -> &[SingleValue] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false: empty containers are represented as Null.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SingleValue> {
        self.items.iter()
    }

    pub fn contains(&self, item: &SingleValue) -> bool {
        self.items.iter().any(|i| i == item)
    }

    pub fn into_items(self) -> Vec<SingleValue> {
        self.items
    }
}

/// Non-empty map of named single values.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    fields: BTreeMap<Identifier, SingleValue>,
}

impl RecordValue {
    pub fn get(&self, field: &str) -> Option<&SingleValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &SingleValue)> {
        self.fields.iter()
    }

    pub fn into_fields(self) -> BTreeMap<Identifier, SingleValue> {
        self.fields
    }
}

// ──────────────────────────────────────────────
// Value
// ──────────────────────────────────────────────

/// A variable or expression value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "repr::ValueRepr", into = "repr::ValueRepr")]
pub enum Value {
    #[default]
    Null,
    Single(SingleValue),
    Multiple(Container),
    Ordered(Container),
    Record(RecordValue),
}

impl Value {
    /// Unordered bag of `items`; Null when `items` is empty.
    ///
    /// Every item must carry `base_type`.
    pub fn multiple(base_type: BaseType, items: impl IntoIterator<Item = SingleValue>) -> Value {
        match Self::collect(base_type, items) {
            Some(c) => Value::Multiple(c),
            None => Value::Null,
        }
    }

    /// Sequence of `items`; Null when `items` is empty.
    pub fn ordered(base_type: BaseType, items: impl IntoIterator<Item = SingleValue>) -> Value {
        match Self::collect(base_type, items) {
            Some(c) => Value::Ordered(c),
            None => Value::Null,
        }
    }

    /// Build a container of the given cardinality. Single cardinality takes
    /// the first item; record cardinality always yields Null.
    pub fn from_items(
        cardinality: Cardinality,
        base_type: BaseType,
        items: impl IntoIterator<Item = SingleValue>,
    ) -> Value {
        match cardinality {
            Cardinality::Single => items.into_iter().next().map_or(Value::Null, Value::Single),
            Cardinality::Multiple => Value::multiple(base_type, items),
            Cardinality::Ordered => Value::ordered(base_type, items),
            Cardinality::Record => Value::Null,
        }
    }

    pub fn record(fields: impl IntoIterator<Item = (Identifier, SingleValue)>) -> Value {
        let fields: BTreeMap<Identifier, SingleValue> = fields.into_iter().collect();
        if fields.is_empty() {
            Value::Null
        } else {
            Value::Record(RecordValue { fields })
        }
    }

    fn collect(
        base_type: BaseType,
        items: impl IntoIterator<Item = SingleValue>,
    ) -> Option<Container> {
        let items: Vec<SingleValue> = items.into_iter().collect();
        debug_assert!(items.iter().all(|i| i.base_type() == base_type));
        if items.is_empty() {
            None
        } else {
            Some(Container { base_type, items })
        }
    }

    pub fn integer(v: i32) -> Value {
        Value::Single(SingleValue::Integer(v))
    }

    pub fn float(v: f64) -> Value {
        Value::Single(SingleValue::Float(v))
    }

    pub fn boolean(v: bool) -> Value {
        Value::Single(SingleValue::Boolean(v))
    }

    pub fn string(v: impl Into<String>) -> Value {
        Value::Single(SingleValue::String(v.into()))
    }

    pub fn identifier(v: Identifier) -> Value {
        Value::Single(SingleValue::Identifier(v))
    }

    pub fn duration(seconds: f64) -> Value {
        Value::Single(SingleValue::Duration(seconds))
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Single(_) => false,
            Value::Multiple(c) | Value::Ordered(c) => c.items.is_empty(),
            Value::Record(r) => r.fields.is_empty(),
        }
    }

    /// `None` for Null.
    pub fn cardinality(&self) -> Option<Cardinality> {
        match self {
            v if v.is_null() => None,
            Value::Single(_) => Some(Cardinality::Single),
            Value::Multiple(_) => Some(Cardinality::Multiple),
            Value::Ordered(_) => Some(Cardinality::Ordered),
            Value::Record(_) => Some(Cardinality::Record),
            Value::Null => None,
        }
    }

    /// `None` for Null and for records.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Value::Single(s) => Some(s.base_type()),
            Value::Multiple(c) | Value::Ordered(c) if !c.items.is_empty() => Some(c.base_type),
            _ => None,
        }
    }

    /// Null counts as matching any declaration.
    pub fn conforms_to(&self, cardinality: Cardinality, base_type: Option<BaseType>) -> bool {
        match self.cardinality() {
            None => true,
            Some(Cardinality::Record) => cardinality == Cardinality::Record,
            Some(c) => c == cardinality && self.base_type() == base_type,
        }
    }

    pub fn as_single(&self) -> Option<&SingleValue> {
        match self {
            Value::Single(s) => Some(s),
            _ => None,
        }
    }

    /// Multiple or ordered contents.
    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Multiple(c) | Value::Ordered(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_single().and_then(SingleValue::as_bool)
    }

    pub fn as_integer(&self) -> Option<i32> {
        self.as_single().and_then(SingleValue::as_integer)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_single().and_then(SingleValue::as_f64)
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        self.as_single().and_then(SingleValue::as_identifier)
    }

    /// Elements of a single, multiple or ordered value; empty for Null and
    /// records.
    pub fn items(&self) -> &[SingleValue] {
        match self {
            Value::Single(s) => std::slice::from_ref(s),
            Value::Multiple(c) | Value::Ordered(c) => &c.items,
            Value::Null | Value::Record(_) => &[],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Record(r) => r.fields.len(),
            other => other.items().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Single values compare directly; containers test membership.
    pub fn contains_single(&self, item: &SingleValue) -> bool {
        self.items().iter().any(|i| i == item)
    }

    /// Widen integer contents to float. Other values are unchanged.
    pub fn widen_to_float(self) -> Value {
        match self {
            Value::Single(s) => Value::Single(s.widen_to_float()),
            Value::Multiple(c) if c.base_type == BaseType::Integer => Value::multiple(
                BaseType::Float,
                c.items.into_iter().map(SingleValue::widen_to_float),
            ),
            Value::Ordered(c) if c.base_type == BaseType::Integer => Value::ordered(
                BaseType::Float,
                c.items.into_iter().map(SingleValue::widen_to_float),
            ),
            other => other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_null() || other.is_null() {
            return self.is_null() && other.is_null();
        }
        match (self, other) {
            (Value::Single(a), Value::Single(b)) => a == b,
            (Value::Multiple(a), Value::Multiple(b)) => multiset_eq(&a.items, &b.items),
            (Value::Ordered(a), Value::Ordered(b)) => a.items == b.items,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

fn multiset_eq(a: &[SingleValue], b: &[SingleValue]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut consumed = vec![false; b.len()];
    for x in a {
        let hit = b
            .iter()
            .enumerate()
            .position(|(i, y)| !consumed[i] && x == y);
        match hit {
            Some(i) => consumed[i] = true,
            None => return false,
        }
    }
    true
}

impl From<SingleValue> for Value {
    fn from(v: SingleValue) -> Self {
        Value::Single(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::float(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |items: &[SingleValue]| {
            items
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            v if v.is_null() => f.write_str("NULL"),
            Value::Single(s) => write!(f, "{}", s),
            Value::Multiple(c) => write!(f, "{{{}}}", join(&c.items)),
            Value::Ordered(c) => write!(f, "[{}]", join(&c.items)),
            Value::Record(r) => {
                let fields: Vec<String> =
                    r.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "record{{{}}}", fields.join(", "))
            }
            Value::Null => f.write_str("NULL"),
        }
    }
}
