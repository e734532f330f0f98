use std::sync::Arc;

use conductor_config::{Value, ValueMap};
use conductor_registry::ActionTemplate;

/// A fully resolved call to one action.
#[derive(Debug, Clone)]
pub struct Invocation {
  pub intent_id: String,
  pub step_id: String,
  pub target: Arc<ActionTemplate>,
  pub parameters: ValueMap,
}

impl Invocation {
  pub fn capability(&self) -> &str {
    &self.target.capability
  }

  pub fn action(&self) -> &str {
    &self.target.action
  }

  /// The same call against another target.
  pub fn redirect(&self, target: Arc<ActionTemplate>) -> Self {
    Self {
      target,
      ..self.clone()
    }
  }
}

/// The structured reply of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOutput {
  pub output: Value,
  pub cost: Option<f64>,
}

impl InvocationOutput {
  pub fn new(output: impl Into<Value>) -> Self {
    Self {
      output: output.into(),
      cost: None,
    }
  }

  pub fn with_cost(mut self, cost: f64) -> Self {
    self.cost = Some(cost);
    self
  }

  /// Extract output and cost from a reply body.
  ///
  /// A reply object carrying an `output` key contributes that value; any
  /// other reply is the output as a whole. A numeric top-level `cost` is
  /// picked up either way.
  pub fn from_reply(body: serde_json::Value) -> Self {
    let cost = body
      .get("cost")
      .and_then(serde_json::Value::as_f64)
      .filter(|cost| cost.is_finite());

    let output = match body {
      serde_json::Value::Object(mut map) if map.contains_key("output") => {
        map.remove("output").unwrap_or_default()
      }
      other => other,
    };

    Self {
      output: output.into(),
      cost,
    }
  }
}
