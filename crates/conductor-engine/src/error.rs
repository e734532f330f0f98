use conductor_validator::ValidationError;
use thiserror::Error;

/// Errors surfaced by [`crate::IntentRunner`] submissions.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The intent was rejected before execution.
  #[error("invalid intent: {0}")]
  Validation(#[from] ValidationError),

  /// The runner is no longer accepting intents.
  #[error("intent runner channel closed")]
  RunnerClosed,

  /// The runner stopped before replying.
  #[error("intent runner dropped the reply")]
  ReplyDropped,
}
