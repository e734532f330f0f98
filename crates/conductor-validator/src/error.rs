use conductor_registry::RegistryError;
use thiserror::Error;

/// Reasons an intent is rejected before anything is invoked.
#[derive(Debug, Error)]
pub enum ValidationError {
  /// The intent has no steps at all.
  #[error("intent has no steps")]
  EmptyIntent,

  /// A parallel group has no substeps.
  #[error("parallel group '{step_id}' has no substeps")]
  EmptyGroup { step_id: String },

  /// The `single` shape takes exactly one step.
  #[error("single execution shape requires exactly one step, found {count}")]
  SingleShapeStepCount { count: usize },

  #[error("duplicate step id: {step_id}")]
  DuplicateStepId { step_id: String },

  #[error("step '{step_id}': {source}")]
  UnresolvedAction {
    step_id: String,
    #[source]
    source: RegistryError,
  },

  #[error("step '{step_id}' fallback: {source}")]
  UnresolvedFallback {
    step_id: String,
    #[source]
    source: RegistryError,
  },

  /// `fallback_action` given without a `fallback_capability`.
  #[error("step '{step_id}' sets fallback_action without fallback_capability")]
  FallbackWithoutCapability { step_id: String },

  /// `input_from` names a step that only runs later (or the step itself).
  #[error("step '{step_id}' takes input from '{reference}', which has not run yet")]
  ForwardReference { step_id: String, reference: String },

  /// `input_from` names a member of the same concurrent group.
  #[error("step '{step_id}' takes input from '{reference}', which runs concurrently with it")]
  SiblingReference { step_id: String, reference: String },

  #[error("step '{step_id}' takes input from unknown step '{reference}'")]
  UnknownReference { step_id: String, reference: String },

  #[error("result_step '{step_id}' does not name a step")]
  UnknownResultStep { step_id: String },

  #[error("timeout for {scope} must be greater than zero")]
  InvalidTimeout { scope: String },
}

impl ValidationError {
  /// The offending step, when the issue is tied to one.
  pub fn step_id(&self) -> Option<&str> {
    match self {
      ValidationError::EmptyIntent
      | ValidationError::SingleShapeStepCount { .. }
      | ValidationError::InvalidTimeout { .. } => None,
      ValidationError::EmptyGroup { step_id }
      | ValidationError::DuplicateStepId { step_id }
      | ValidationError::UnresolvedAction { step_id, .. }
      | ValidationError::UnresolvedFallback { step_id, .. }
      | ValidationError::FallbackWithoutCapability { step_id }
      | ValidationError::ForwardReference { step_id, .. }
      | ValidationError::SiblingReference { step_id, .. }
      | ValidationError::UnknownReference { step_id, .. }
      | ValidationError::UnknownResultStep { step_id } => Some(step_id),
    }
  }
}
