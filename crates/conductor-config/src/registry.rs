//! On-disk format of the capability registry.
//!
//! ```json
//! {
//!   "version": "2024-06-01",
//!   "capabilities": {
//!     "echo": {
//!       "base_url": "http://localhost:8001",
//!       "health_path": "/health",
//!       "actions": {
//!         "ping": { "endpoint": "/ping", "method": "POST", "parameters": ["msg"], "timeout_ms": 5000 }
//!       }
//!     }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDef {
  pub version: String,
  pub capabilities: IndexMap<String, CapabilityDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDef {
  pub base_url: String,
  #[serde(default = "default_health_path")]
  pub health_path: String,
  pub actions: IndexMap<String, ActionDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
  /// Path relative to the capability's base URL. `{name}` segments are
  /// filled from the step's parameters.
  pub endpoint: String,
  #[serde(default = "default_method")]
  pub method: String,
  /// Accepted parameter names.
  #[serde(default)]
  pub parameters: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

fn default_health_path() -> String {
  "/health".to_string()
}

fn default_method() -> String {
  "POST".to_string()
}
