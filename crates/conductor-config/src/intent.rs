use serde::{Deserialize, Serialize};

use crate::enums::{ExecutionShape, RetryBackoff};
use crate::step::StepDef;
use crate::value::Value;

/// One unit of requested work, as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
  /// Generated by the engine when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub intent_id: Option<String>,
  /// Free-form origin tag, e.g. `"telegram"` or `"cron"`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,
  pub execution_shape: ExecutionShape,
  pub steps: Vec<StepDef>,
  #[serde(default, skip_serializing_if = "IntentOptions::is_default")]
  pub options: IntentOptions,
  /// Caller metadata, passed through untouched.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<Value>,
  /// Step whose output becomes the response's `result`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result_step: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntentOptions {
  /// Ceiling for the whole intent, and the last resort for step timeouts.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  /// Default number of re-issues of a failed primary invocation.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retries: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry_backoff: Option<RetryBackoff>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry_initial_delay_ms: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fail_fast: Option<bool>,
}

impl IntentOptions {
  pub fn is_default(&self) -> bool {
    *self == Self::default()
  }

  /// Fail-fast unless explicitly disabled.
  pub fn fail_fast(&self) -> bool {
    self.fail_fast.unwrap_or(true)
  }
}
