use std::fmt;

use serde::{Deserialize, Serialize};

/// How the top-level steps of an intent are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionShape {
  /// Exactly one step; its output is the intent's result.
  Single,
  /// Steps run strictly in order, later steps may consume earlier outputs.
  Chain,
  /// All steps run concurrently against the outputs available at dispatch.
  Parallel,
  /// Steps run in order, each gated by its condition.
  Conditional,
}

impl ExecutionShape {
  pub fn as_str(&self) -> &'static str {
    match self {
      ExecutionShape::Single => "single",
      ExecutionShape::Chain => "chain",
      ExecutionShape::Parallel => "parallel",
      ExecutionShape::Conditional => "conditional",
    }
  }
}

impl fmt::Display for ExecutionShape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
  #[default]
  Constant,
  Linear,
  Exponential,
}
