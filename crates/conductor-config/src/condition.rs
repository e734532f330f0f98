use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A guard on a step: the step runs only when the condition holds.
///
/// `field` is a placeholder path without braces, e.g. `check.output.status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
  pub field: String,
  pub operator: Operator,
  /// Comparison value. Ignored by `exists`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
  Eq,
  Ne,
  Gt,
  Lt,
  Contains,
  Exists,
}
