use std::time::Duration;

/// Engine-wide defaults, applied when neither the intent nor the registry
/// says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
  /// Last resort for a step's timeout.
  pub default_step_timeout: Duration,
  /// Deadline for a whole intent without `options.timeout_ms`.
  pub default_intent_timeout: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      default_step_timeout: Duration::from_secs(30),
      default_intent_timeout: Duration::from_secs(300),
    }
  }
}
