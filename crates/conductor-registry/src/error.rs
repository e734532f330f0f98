use thiserror::Error;

/// Errors that can occur when loading or querying the capability registry.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// Capability not present in the registry.
  #[error("capability not found: {capability}")]
  CapabilityNotFound { capability: String },

  /// Capability exists but does not expose the action.
  #[error("action not found: {capability}.{action}")]
  ActionNotFound { capability: String, action: String },

  /// Base URL could not be parsed.
  #[error("invalid base url for capability '{capability}': {source}")]
  InvalidBaseUrl {
    capability: String,
    #[source]
    source: url::ParseError,
  },

  /// HTTP method not supported by the invocation protocol.
  #[error("unsupported method '{method}' for {capability}.{action}")]
  UnsupportedMethod {
    capability: String,
    action: String,
    method: String,
  },

  /// IO error when reading the registry file.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Failed to parse the registry JSON.
  #[error("invalid registry definition: {0}")]
  InvalidDefinition(#[from] serde_json::Error),
}
