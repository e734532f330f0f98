use std::cmp::Ordering;

use conductor_config::{Condition, Operator, Value};

use crate::parser::PathExpr;
use crate::resolve::{OutputLookup, canonical_text, resolve_path};

/// Decide whether a conditional step should run.
///
/// The field path is resolved exactly like a template placeholder. When it
/// does not resolve, every operator evaluates to false, `exists` included.
/// `exists` is true for any resolved value other than `null`.
pub fn evaluate<L>(condition: &Condition, lookup: &L) -> bool
where
  L: OutputLookup + ?Sized,
{
  let Some(path) = PathExpr::parse(&condition.field) else {
    return false;
  };
  let Some(actual) = resolve_path(&path, lookup) else {
    return false;
  };

  let null = Value::Null;
  let expected = condition.value.as_ref().unwrap_or(&null);

  match condition.operator {
    Operator::Exists => !actual.is_null(),
    Operator::Eq => values_equal(&actual, expected),
    Operator::Ne => !values_equal(&actual, expected),
    Operator::Gt => compare(&actual, expected) == Some(Ordering::Greater),
    Operator::Lt => compare(&actual, expected) == Some(Ordering::Less),
    Operator::Contains => contains(&actual, expected),
  }
}

/// Numbers compare by value so that `1` equals `1.0`; everything else
/// compares structurally.
fn values_equal(a: &Value, b: &Value) -> bool {
  match (a.as_f64(), b.as_f64()) {
    (Some(x), Some(y)) => x == y,
    _ => a == b,
  }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
  match (a, b) {
    (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
    _ => None,
  }
}

/// Substring for strings, membership for lists, key presence for maps.
fn contains(haystack: &Value, needle: &Value) -> bool {
  match haystack {
    Value::String(s) => s.contains(canonical_text(needle).as_str()),
    Value::List(items) => items.iter().any(|item| values_equal(item, needle)),
    Value::Map(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
    _ => false,
  }
}
