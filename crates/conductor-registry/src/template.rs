use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP-like method used to invoke an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }

  /// Whether parameters travel as a JSON body (otherwise as a query string).
  pub fn has_body(&self) -> bool {
    matches!(self, Method::Post | Method::Put | Method::Patch)
  }
}

impl FromStr for Method {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "GET" => Ok(Method::Get),
      "POST" => Ok(Method::Post),
      "PUT" => Ok(Method::Put),
      "PATCH" => Ok(Method::Patch),
      "DELETE" => Ok(Method::Delete),
      _ => Err(()),
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Everything needed to invoke one action of one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTemplate {
  pub capability: String,
  pub action: String,
  pub base_url: String,
  /// Endpoint path; may contain `{param}` segments.
  pub endpoint: String,
  pub method: Method,
  /// Accepted parameter names.
  pub parameters: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl ActionTemplate {
  pub fn default_timeout(&self) -> Option<Duration> {
    self.timeout_ms.map(Duration::from_millis)
  }

  /// Full endpoint URL, before `{param}` substitution.
  pub fn url(&self) -> String {
    join_url(&self.base_url, &self.endpoint)
  }

  pub fn accepts(&self, parameter: &str) -> bool {
    self.parameters.iter().any(|p| p == parameter)
  }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
  let base = base.trim_end_matches('/');
  let path = path.trim_start_matches('/');
  if path.is_empty() {
    base.to_string()
  } else {
    format!("{}/{}", base, path)
  }
}
