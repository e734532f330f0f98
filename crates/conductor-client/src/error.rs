use thiserror::Error;

/// Why a single invocation failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvocationError {
  #[error("{capability}.{action} timed out after {timeout_ms}ms")]
  Timeout {
    capability: String,
    action: String,
    timeout_ms: u64,
  },

  /// The capability could not be reached (connection refused, DNS, reset).
  #[error("{capability}.{action} unreachable: {message}")]
  Transport {
    capability: String,
    action: String,
    message: String,
  },

  /// The capability answered with a non-success status.
  #[error("{capability}.{action} returned status {status}: {body}")]
  Status {
    capability: String,
    action: String,
    status: u16,
    body: String,
  },

  #[error("{capability}.{action} returned an invalid reply: {message}")]
  InvalidReply {
    capability: String,
    action: String,
    message: String,
  },

  /// The request could not be built from the resolved parameters.
  #[error("{capability}.{action} invalid request: {message}")]
  InvalidRequest {
    capability: String,
    action: String,
    message: String,
  },
}

impl InvocationError {
  /// Timeouts and transport failures may succeed elsewhere, so they are
  /// retried and then handed to the fallback. Everything else is terminal.
  pub fn triggers_fallback(&self) -> bool {
    matches!(
      self,
      InvocationError::Timeout { .. } | InvocationError::Transport { .. }
    )
  }
}
