use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use conductor_config::{CapabilityDef, RegistryDef};
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::error::RegistryError;
use crate::template::{ActionTemplate, Method, join_url};

/// A capability and the actions it exposes.
#[derive(Debug, Clone, Serialize)]
pub struct Capability {
  pub name: String,
  pub base_url: String,
  pub health_path: String,
  pub actions: BTreeMap<String, Arc<ActionTemplate>>,
}

impl Capability {
  pub fn health_url(&self) -> String {
    join_url(&self.base_url, &self.health_path)
  }
}

/// Immutable `(capability, action)` lookup table.
///
/// Safe for unsynchronized concurrent reads; there is no way to mutate a
/// registry once it is built.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
  version: String,
  capabilities: BTreeMap<String, Capability>,
}

impl CapabilityRegistry {
  /// Build a registry from its definition, validating URLs and methods.
  pub fn from_def(def: RegistryDef) -> Result<Self, RegistryError> {
    let mut capabilities = BTreeMap::new();

    for (name, capability_def) in def.capabilities {
      let capability = build_capability(&name, capability_def)?;
      capabilities.insert(name, capability);
    }

    Ok(Self {
      version: def.version,
      capabilities,
    })
  }

  /// Parse a registry from a JSON document.
  pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
    let def: RegistryDef = serde_json::from_str(json)?;
    Self::from_def(def)
  }

  /// Load a registry from a JSON file.
  pub async fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).await?;
    let registry = Self::from_json_str(&content)?;

    info!(
      path = %path.display(),
      version = %registry.version,
      capabilities = registry.capabilities.len(),
      "capability registry loaded"
    );

    Ok(registry)
  }

  /// Resolve an action to its invocation template.
  pub fn resolve(
    &self,
    capability: &str,
    action: &str,
  ) -> Result<&Arc<ActionTemplate>, RegistryError> {
    let entry =
      self
        .capabilities
        .get(capability)
        .ok_or_else(|| RegistryError::CapabilityNotFound {
          capability: capability.to_string(),
        })?;

    entry
      .actions
      .get(action)
      .ok_or_else(|| RegistryError::ActionNotFound {
        capability: capability.to_string(),
        action: action.to_string(),
      })
  }

  /// All capabilities, ordered by name.
  pub fn list(&self) -> impl Iterator<Item = &Capability> {
    self.capabilities.values()
  }

  /// Look up a capability by name.
  pub fn describe(&self, capability: &str) -> Option<&Capability> {
    self.capabilities.get(capability)
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn len(&self) -> usize {
    self.capabilities.len()
  }

  pub fn is_empty(&self) -> bool {
    self.capabilities.is_empty()
  }
}

fn build_capability(name: &str, def: CapabilityDef) -> Result<Capability, RegistryError> {
  url::Url::parse(&def.base_url).map_err(|source| RegistryError::InvalidBaseUrl {
    capability: name.to_string(),
    source,
  })?;

  if def.actions.is_empty() {
    warn!(capability = %name, "capability declares no actions");
  }

  let mut actions = BTreeMap::new();
  for (action_name, action_def) in def.actions {
    let method: Method =
      action_def
        .method
        .parse()
        .map_err(|_| RegistryError::UnsupportedMethod {
          capability: name.to_string(),
          action: action_name.clone(),
          method: action_def.method.clone(),
        })?;

    let template = ActionTemplate {
      capability: name.to_string(),
      action: action_name.clone(),
      base_url: def.base_url.clone(),
      endpoint: action_def.endpoint,
      method,
      parameters: action_def.parameters,
      timeout_ms: action_def.timeout_ms,
    };
    actions.insert(action_name, Arc::new(template));
  }

  Ok(Capability {
    name: name.to_string(),
    base_url: def.base_url,
    health_path: def.health_path,
    actions,
  })
}
