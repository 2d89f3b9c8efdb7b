//! Conversions between the engine value model and `serde_json` trees.
//!
//! JSON is the interchange format used by shells and import/export
//! tooling; the mapping is lossy only where JSON itself is (decimals,
//! dates, and binary become strings or numbers on the way out).

use serde_json::{Map, Number};

use crate::document::value::{Document, Value};
use crate::error::{Error, Result};

impl Value {
    /// Builds a value from a JSON tree. Integral numbers become
    /// `Int32` when they fit, `Int64` otherwise; fractions become
    /// `Double`. Object key order is preserved.
    pub fn from_json(json: &serde_json::Value) -> Result<Value> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => number_to_value(n)?,
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Value::from_json(item)?);
                }
                Value::Array(out)
            }
            serde_json::Value::Object(map) => {
                let mut doc = Document::new();
                for (key, item) in map {
                    doc.insert(key.clone(), Value::from_json(item)?)?;
                }
                Value::Document(doc)
            }
        })
    }

    /// Renders the value as a JSON tree. `Decimal`, `DateTime`,
    /// `ObjectId`, and `Guid` render as strings; `Binary` as an array
    /// of byte numbers; `MinValue`/`MaxValue` as sentinel strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int32(i) => serde_json::Value::from(*i),
            Value::Int64(i) => serde_json::Value::from(*i),
            Value::Double(d) => Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(d) => serde_json::Value::String(d.to_string()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::ObjectId(id) => serde_json::Value::String(id.to_string()),
            Value::Guid(g) => serde_json::Value::String(g.to_string()),
            Value::Binary(bytes) => {
                serde_json::Value::Array(bytes.iter().map(|b| serde_json::Value::from(*b)).collect())
            }
            Value::MinValue => serde_json::Value::String("$minValue".into()),
            Value::MaxValue => serde_json::Value::String("$maxValue".into()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Document(doc) => {
                let mut map = Map::new();
                for (key, value) in doc.iter() {
                    map.insert(key.to_owned(), value.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

fn number_to_value(n: &Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(match i32::try_from(i) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(i),
        });
    }
    if let Some(d) = n.as_f64() {
        return Ok(Value::Double(d));
    }
    Err(Error::InvalidDataType(format!(
        "number {n} is out of the representable range"
    )))
}
