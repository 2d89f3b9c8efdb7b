//! Tagged value union shared by documents, expressions, and the planner.
//!
//! A [`Value`] is either a scalar leaf, an ordered [`Document`], or an
//! array. A total order is defined across all variants; string
//! comparisons inside it are parameterized by a [`Collation`].

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::document::collation::Collation;
use crate::document::objectid::ObjectId;
use crate::error::{Error, Result};

/// Typed value tagged with explicit type information so the tree shape
/// stays unambiguous across layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// Null literal; sorts below every other variant.
    Null,
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 64-bit floating point.
    Double(f64),
    /// 128-bit fixed-point decimal.
    Decimal(Decimal),
    /// UTF-8 string.
    String(String),
    /// Boolean.
    Boolean(bool),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// 12-byte document identifier.
    ObjectId(ObjectId),
    /// 128-bit UUID.
    Guid(Uuid),
    /// Arbitrary binary payload.
    Binary(Vec<u8>),
    /// Sorts below every non-null value; usable as an open range bound.
    MinValue,
    /// Sorts above every other value.
    MaxValue,
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Ordered string-keyed mapping.
    Document(Document),
}

impl Value {
    /// Rank of the variant in the cross-type total order.
    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::MinValue => 1,
            Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal(_) => 2,
            Value::DateTime(_) => 3,
            Value::String(_) => 4,
            Value::Document(_) => 5,
            Value::Array(_) => 6,
            Value::Binary(_) => 7,
            Value::ObjectId(_) => 8,
            Value::Guid(_) => 9,
            Value::Boolean(_) => 10,
            Value::MaxValue => 11,
        }
    }

    /// True for the four numeric variants.
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal(_)
        )
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for `String`.
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// True for `Array`.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// True for `Document`.
    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    /// Borrows the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the document payload, if any.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Borrows the array payload, if any.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Predicate truthiness: only `Boolean(true)` passes a filter.
    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }

    /// Numeric payload widened to `i64`, with string parsing.
    pub fn to_int64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            Value::Double(d) => Some(*d as i64),
            Value::Decimal(d) => d.to_i64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric payload as `i32` when it fits.
    pub fn to_int32(&self) -> Option<i32> {
        self.to_int64().and_then(|i| i32::try_from(i).ok())
    }

    /// Numeric payload widened to `f64`, with string parsing.
    pub fn to_double(&self) -> Option<f64> {
        match self {
            Value::Int32(i) => Some(f64::from(*i)),
            Value::Int64(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Decimal(d) => d.to_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric payload widened to `Decimal`, with string parsing.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int32(i) => Some(Decimal::from(*i)),
            Value::Int64(i) => Some(Decimal::from(*i)),
            Value::Double(d) => Decimal::from_f64(*d),
            Value::Decimal(d) => Some(*d),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Three-way comparison under the cross-type total order, using the
    /// supplied collation for string contents.
    pub fn compare(&self, other: &Value, collation: &Collation) -> Ordering {
        if self.is_number() && other.is_number() {
            return compare_numbers(self, other);
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::MinValue, Value::MinValue) => Ordering::Equal,
            (Value::MaxValue, Value::MaxValue) => Ordering::Equal,
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => collation.compare(a, b),
            (Value::Document(a), Value::Document(b)) => a.compare(b, collation),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y, collation) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Guid(a), Value::Guid(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            _ => self.type_order().cmp(&other.type_order()),
        }
    }

    /// Equality under the supplied collation.
    pub fn eq_with(&self, other: &Value, collation: &Collation) -> bool {
        self.compare(other, collation) == Ordering::Equal
    }
}

/// Widened comparison across the four numeric variants.
fn compare_numbers(left: &Value, right: &Value) -> Ordering {
    use Value::{Decimal as Dec, Int32, Int64};
    match (left, right) {
        (Int32(a), Int32(b)) => a.cmp(b),
        (Int32(a), Int64(b)) => i64::from(*a).cmp(b),
        (Int64(a), Int32(b)) => a.cmp(&i64::from(*b)),
        (Int64(a), Int64(b)) => a.cmp(b),
        (Dec(a), Dec(b)) => a.cmp(b),
        (Dec(a), Int32(b)) => a.cmp(&Decimal::from(*b)),
        (Dec(a), Int64(b)) => a.cmp(&Decimal::from(*b)),
        (Int32(a), Dec(b)) => Decimal::from(*a).cmp(b),
        (Int64(a), Dec(b)) => Decimal::from(*a).cmp(b),
        _ => {
            let a = left.to_double().unwrap_or(f64::NAN);
            let b = right.to_double().unwrap_or(f64::NAN);
            a.total_cmp(&b)
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other, &Collation::binary()) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other, &Collation::binary())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int32(i) => write!(f, "{i}"),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{}", crate::document::format_double(*d)),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::ObjectId(id) => write!(f, "{id}"),
            Value::Guid(g) => write!(f, "{g}"),
            Value::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::MinValue => write!(f, "<minvalue>"),
            Value::MaxValue => write!(f, "<maxvalue>"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Document(doc) => {
                write!(f, "{{")?;
                for (i, (key, value)) in doc.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::ObjectId(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Guid(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

/// Ordered string-keyed mapping with unique, case-sensitive keys.
///
/// Insertion order is preserved; replacing an existing key keeps its
/// original position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Document {
            entries: Vec::new(),
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the document holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces a key. Keys reject the `\0` character.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if key.contains('\0') {
            return Err(Error::InvalidNullCharInString(key.replace('\0', "\\0")));
        }
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    /// Case-sensitive lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Lookup by insertion position, used for positional parameters.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(_, v)| v)
    }

    /// True when the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Copies every key of `other` into `self`, replacing collisions.
    /// Keys starting with `$` are reserved and rejected.
    pub fn extend_from(&mut self, other: &Document) -> Result<()> {
        for (key, value) in other.iter() {
            if key.starts_with('$') {
                return Err(Error::InvalidUpdateField(key.to_owned()));
            }
            self.insert(key, value.clone())?;
        }
        Ok(())
    }

    /// Key-then-value lexicographic comparison.
    pub fn compare(&self, other: &Document, collation: &Collation) -> Ordering {
        for ((ka, va), (kb, vb)) in self.iter().zip(other.iter()) {
            match collation.compare(ka, kb) {
                Ordering::Equal => {}
                other => return other,
            }
            match va.compare(vb, collation) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        self.len().cmp(&other.len())
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DocVisitor;

        impl<'de> Visitor<'de> for DocVisitor {
            type Value = Document;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string-keyed map")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut doc = Document::new();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    doc.insert(key, value).map_err(serde::de::Error::custom)?;
                }
                Ok(doc)
            }
        }

        deserializer.deserialize_map(DocVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        let mut d = Document::new();
        for (k, v) in pairs {
            d.insert(*k, v.clone()).unwrap();
        }
        d
    }

    #[test]
    fn null_sorts_below_everything() {
        let samples = [
            Value::MinValue,
            Value::Int32(-5),
            Value::String("a".into()),
            Value::Boolean(false),
            Value::MaxValue,
        ];
        for sample in samples {
            assert!(Value::Null < sample, "null should sort below {sample:?}");
        }
    }

    #[test]
    fn numbers_compare_widened() {
        assert_eq!(Value::Int32(5), Value::Int64(5));
        assert_eq!(Value::Int64(5), Value::Double(5.0));
        assert_eq!(Value::Double(2.5), Value::Decimal(Decimal::new(25, 1)));
        assert!(Value::Int32(3) < Value::Double(3.5));
        assert!(Value::Decimal(Decimal::from(10)) > Value::Int64(9));
    }

    #[test]
    fn type_order_follows_contract() {
        let ladder = [
            Value::Null,
            Value::MinValue,
            Value::Int32(1),
            Value::DateTime(Utc::now()),
            Value::String("s".into()),
            Value::Document(Document::new()),
            Value::Array(vec![]),
            Value::Binary(vec![1]),
            Value::ObjectId(ObjectId::new()),
            Value::Guid(Uuid::nil()),
            Value::Boolean(false),
            Value::MaxValue,
        ];
        for pair in ladder.windows(2) {
            assert!(pair[0] < pair[1], "{:?} < {:?}", pair[0], pair[1]);
        }
        assert!(Value::Boolean(false) < Value::Boolean(true));
    }

    #[test]
    fn string_equality_uses_collation() {
        let a = Value::String("Name".into());
        let b = Value::String("name".into());
        assert!(!a.eq_with(&b, &Collation::binary()));
        assert!(a.eq_with(&b, &Collation::case_insensitive("en")));
    }

    #[test]
    fn arrays_compare_lexicographically() {
        let a = Value::Array(vec![Value::Int32(1), Value::Int32(2)]);
        let b = Value::Array(vec![Value::Int32(1), Value::Int32(3)]);
        let c = Value::Array(vec![Value::Int32(1)]);
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn document_insert_preserves_order_and_replaces() {
        let mut d = doc(&[("a", Value::Int32(1)), ("b", Value::Int32(2))]);
        d.insert("a", Value::Int32(9)).unwrap();
        let keys: Vec<_> = d.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(d.get("a"), Some(&Value::Int32(9)));
    }

    #[test]
    fn document_rejects_null_char_keys() {
        let mut d = Document::new();
        let err = d.insert("bad\0key", Value::Null).unwrap_err();
        assert_eq!(err.code(), "InvalidNullCharInString");
    }

    #[test]
    fn extend_rejects_reserved_keys() {
        let mut target = Document::new();
        let source = doc(&[("$id", Value::Int32(1))]);
        let err = target.extend_from(&source).unwrap_err();
        assert_eq!(err.code(), "InvalidUpdateField");
    }

    #[test]
    fn serde_roundtrip_preserves_order() {
        let d = doc(&[("z", Value::Int32(1)), ("a", Value::Int32(2))]);
        let json = serde_json::to_string(&Value::Document(d.clone())).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        match back {
            Value::Document(parsed) => {
                assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["z", "a"]);
            }
            other => panic!("expected document, got {other:?}"),
        }
    }
}
