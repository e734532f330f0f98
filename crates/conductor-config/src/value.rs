//! Tagged parameter and output values.
//!
//! Step parameters and capability outputs are open-ended, so they are carried
//! as a closed variant type rather than an untyped blob. Maps keep insertion
//! order and numbers keep their original JSON representation, which keeps
//! serialization lossless.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A dynamically-typed value: string, number, boolean, null, list or map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Number(serde_json::Number),
  String(String),
  List(Vec<Value>),
  Map(IndexMap<String, Value>),
}

impl Value {
  /// Look up a key in a map value.
  pub fn get(&self, key: &str) -> Option<&Value> {
    match self {
      Value::Map(map) => map.get(key),
      _ => None,
    }
  }

  /// Look up an index in a list value.
  pub fn index(&self, index: usize) -> Option<&Value> {
    match self {
      Value::List(items) => items.get(index),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Number(n) => n.as_f64(),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  /// Whether the value is a list or a map.
  pub fn is_structured(&self) -> bool {
    matches!(self, Value::List(_) | Value::Map(_))
  }

  /// Convert into a `serde_json::Value` (used at the HTTP boundary).
  pub fn to_json(&self) -> serde_json::Value {
    self.clone().into()
  }

  /// Build a map value from key/value pairs.
  pub fn map<K, I>(entries: I) -> Self
  where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
  {
    Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
  }
}

impl From<serde_json::Value> for Value {
  fn from(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(b),
      serde_json::Value::Number(n) => Value::Number(n),
      serde_json::Value::String(s) => Value::String(s),
      serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
      serde_json::Value::Object(map) => {
        Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
      }
    }
  }
}

impl From<Value> for serde_json::Value {
  fn from(value: Value) -> Self {
    match value {
      Value::Null => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(b),
      Value::Number(n) => serde_json::Value::Number(n),
      Value::String(s) => serde_json::Value::String(s),
      Value::List(items) => {
        serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
      }
      Value::Map(map) => serde_json::Value::Object(
        map
          .into_iter()
          .map(|(k, v)| (k, serde_json::Value::from(v)))
          .collect(),
      ),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Value::Number(n.into())
  }
}

impl From<f64> for Value {
  /// Non-finite floats have no JSON representation and become `Null`.
  fn from(n: f64) -> Self {
    serde_json::Number::from_f64(n)
      .map(Value::Number)
      .unwrap_or(Value::Null)
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::List(items)
  }
}

impl From<IndexMap<String, Value>> for Value {
  fn from(map: IndexMap<String, Value>) -> Self {
    Value::Map(map)
  }
}

/// Compact JSON.
impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_json())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_map_preserves_insertion_order() {
    let value: Value = serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
    let Value::Map(map) = &value else {
      panic!("expected map");
    };
    let keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    assert_eq!(value.to_string(), r#"{"zeta":1,"alpha":2,"mid":3}"#);
  }

  #[test]
  fn test_numbers_keep_representation() {
    let value: Value = serde_json::from_value(json!({"int": 10, "float": 2.5})).unwrap();
    assert_eq!(value.get("int").unwrap().to_string(), "10");
    assert_eq!(value.get("float").unwrap().as_f64(), Some(2.5));
  }

  #[test]
  fn test_nested_lookup() {
    let value = Value::from(json!({"items": [{"name": "a"}, {"name": "b"}]}));
    let name = value
      .get("items")
      .and_then(|items| items.index(1))
      .and_then(|item| item.get("name"))
      .and_then(Value::as_str);
    assert_eq!(name, Some("b"));
    assert!(value.get("missing").is_none());
    assert!(value.index(0).is_none());
  }

  #[test]
  fn test_non_finite_float_is_null() {
    assert!(Value::from(f64::NAN).is_null());
  }
}
