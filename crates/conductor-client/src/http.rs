use std::time::{Duration, Instant};

use async_trait::async_trait;
use conductor_config::{Value, ValueMap};
use conductor_registry::{ActionTemplate, Capability, Method};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::client::CapabilityClient;
use crate::error::InvocationError;
use crate::invocation::{Invocation, InvocationOutput};

/// Error bodies longer than this are cut before they are recorded.
const MAX_ERROR_BODY: usize = 512;

/// [`CapabilityClient`] speaking JSON over HTTP.
///
/// `{name}` segments in an action's endpoint are filled from the parameter of
/// the same name. The remaining parameters travel as a JSON body for
/// POST/PUT/PATCH and as a query string for GET/DELETE.
#[derive(Debug, Clone, Default)]
pub struct HttpCapabilityClient {
  client: Client,
}

impl HttpCapabilityClient {
  pub fn new() -> Self {
    Self::default()
  }

  /// Use a preconfigured reqwest client (proxies, TLS roots, pool limits).
  pub fn with_client(client: Client) -> Self {
    Self { client }
  }

  /// Probe a capability's health endpoint.
  pub async fn health(&self, capability: &Capability, timeout: Duration) -> HealthStatus {
    let url = capability.health_url();
    let started = Instant::now();
    let result = self.client.get(&url).timeout(timeout).send().await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
      Ok(response) => HealthStatus {
        capability: capability.name.clone(),
        url,
        healthy: response.status().is_success(),
        status: Some(response.status().as_u16()),
        latency_ms,
        error: None,
      },
      Err(e) => HealthStatus {
        capability: capability.name.clone(),
        url,
        healthy: false,
        status: None,
        latency_ms,
        error: Some(e.to_string()),
      },
    }
  }
}

/// Outcome of a health probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
  pub capability: String,
  pub url: String,
  pub healthy: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<u16>,
  pub latency_ms: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[async_trait]
impl CapabilityClient for HttpCapabilityClient {
  #[instrument(
    name = "invoke",
    skip(self, invocation),
    fields(
      step_id = %invocation.step_id,
      capability = %invocation.capability(),
      action = %invocation.action(),
    )
  )]
  async fn invoke(
    &self,
    invocation: &Invocation,
    timeout: Duration,
  ) -> Result<InvocationOutput, InvocationError> {
    let target = &invocation.target;
    let (url, remaining) = render_endpoint(target, &invocation.parameters)?;

    let mut request = self
      .client
      .request(to_reqwest(target.method), &url)
      .header("x-intent-id", &invocation.intent_id)
      .header("x-step-id", &invocation.step_id);

    request = if target.method.has_body() {
      request.json(&Value::Map(remaining))
    } else {
      let query: Vec<(String, String)> = remaining
        .iter()
        .map(|(key, value)| (key.clone(), plain_text(value)))
        .collect();
      request.query(&query)
    };

    let exchange = async {
      let response = request.send().await?;
      let status = response.status();
      let text = response.text().await?;
      Ok::<_, reqwest::Error>((status, text))
    };

    let (status, text) = match tokio::time::timeout(timeout, exchange).await {
      Err(_) => {
        return Err(InvocationError::Timeout {
          capability: target.capability.clone(),
          action: target.action.clone(),
          timeout_ms: timeout.as_millis() as u64,
        });
      }
      Ok(Err(e)) => return Err(classify(target, timeout, e)),
      Ok(Ok(reply)) => reply,
    };

    debug!(status = status.as_u16(), bytes = text.len(), "capability replied");
    decode_reply(target, status, &text)
  }
}

fn to_reqwest(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Patch => reqwest::Method::PATCH,
    Method::Delete => reqwest::Method::DELETE,
  }
}

/// Strings as-is, everything else as compact JSON.
fn plain_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Fill `{name}` endpoint segments from the parameters. Returns the URL and
/// the parameters that were not consumed by the path.
fn render_endpoint(
  target: &ActionTemplate,
  parameters: &ValueMap,
) -> Result<(String, ValueMap), InvocationError> {
  let mut remaining = parameters.clone();
  let mut endpoint = String::with_capacity(target.endpoint.len());
  let mut rest = target.endpoint.as_str();

  while let Some(open) = rest.find('{') {
    let Some(close) = rest[open..].find('}') else {
      break;
    };
    let name = &rest[open + 1..open + close];
    let value = remaining
      .shift_remove(name)
      .ok_or_else(|| InvocationError::InvalidRequest {
        capability: target.capability.clone(),
        action: target.action.clone(),
        message: format!("missing path parameter '{}'", name),
      })?;

    endpoint.push_str(&rest[..open]);
    let encoded: String = url::form_urlencoded::byte_serialize(plain_text(&value).as_bytes()).collect();
    endpoint.push_str(&encoded.replace('+', "%20"));
    rest = &rest[open + close + 1..];
  }
  endpoint.push_str(rest);

  let url = conductor_registry::join_url(&target.base_url, &endpoint);
  Ok((url, remaining))
}

fn classify(target: &ActionTemplate, timeout: Duration, error: reqwest::Error) -> InvocationError {
  let capability = target.capability.clone();
  let action = target.action.clone();

  if error.is_timeout() {
    InvocationError::Timeout {
      capability,
      action,
      timeout_ms: timeout.as_millis() as u64,
    }
  } else if error.is_decode() || error.is_body() {
    InvocationError::InvalidReply {
      capability,
      action,
      message: error.to_string(),
    }
  } else if error.is_builder() {
    InvocationError::InvalidRequest {
      capability,
      action,
      message: error.to_string(),
    }
  } else {
    InvocationError::Transport {
      capability,
      action,
      message: error.to_string(),
    }
  }
}

fn decode_reply(
  target: &ActionTemplate,
  status: StatusCode,
  text: &str,
) -> Result<InvocationOutput, InvocationError> {
  if !status.is_success() {
    let mut body = text.trim().to_string();
    if body.len() > MAX_ERROR_BODY {
      let mut cut = MAX_ERROR_BODY;
      while !body.is_char_boundary(cut) {
        cut -= 1;
      }
      body.truncate(cut);
    }
    return Err(InvocationError::Status {
      capability: target.capability.clone(),
      action: target.action.clone(),
      status: status.as_u16(),
      body,
    });
  }

  if text.trim().is_empty() {
    return Ok(InvocationOutput::new(Value::Null));
  }

  let body: serde_json::Value =
    serde_json::from_str(text).map_err(|e| InvocationError::InvalidReply {
      capability: target.capability.clone(),
      action: target.action.clone(),
      message: e.to_string(),
    })?;

  Ok(InvocationOutput::from_reply(body))
}
