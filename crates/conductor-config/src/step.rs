use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::ValueMap;
use crate::condition::Condition;

/// A planned invocation, or a nested group of concurrently executed steps.
///
/// On the wire the two are told apart by the presence of `substeps`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepDef {
  Group(ParallelGroupDef),
  Action(ActionStepDef),
}

impl StepDef {
  pub fn step_id(&self) -> &str {
    match self {
      StepDef::Group(group) => &group.step_id,
      StepDef::Action(step) => &step.step_id,
    }
  }

  pub fn condition(&self) -> Option<&Condition> {
    match self {
      StepDef::Group(group) => group.condition.as_ref(),
      StepDef::Action(step) => step.condition.as_ref(),
    }
  }
}

impl<'de> Deserialize<'de> for StepDef {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    // Dispatch on `substeps` so field errors are reported against the right
    // variant instead of a generic untagged-enum mismatch.
    let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    let is_group = raw.contains_key("substeps");
    let value = serde_json::Value::Object(raw);
    if is_group {
      serde_json::from_value(value)
        .map(StepDef::Group)
        .map_err(de::Error::custom)
    } else {
      serde_json::from_value(value)
        .map(StepDef::Action)
        .map_err(de::Error::custom)
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStepDef {
  pub step_id: String,
  pub capability: String,
  pub action: String,
  #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
  pub parameters: ValueMap,
  /// Prior step whose output is passed through as the `input` parameter.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_from: Option<String>,
  /// String with `{{step_id.path}}` placeholders, resolved into `input`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_template: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<Condition>,
  #[serde(default, skip_serializing_if = "StepOptions::is_default")]
  pub step_options: StepOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelGroupDef {
  pub step_id: String,
  pub substeps: Vec<StepDef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  /// Whether a failure of this step fails the intent. Defaults to true.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub required: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fallback_capability: Option<String>,
  /// Action to call on the fallback capability. Defaults to the step's action.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fallback_action: Option<String>,
  /// Overrides the intent's default retry count.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retries: Option<u32>,
}

impl StepOptions {
  pub fn is_default(&self) -> bool {
    *self == Self::default()
  }

  pub fn required(&self) -> bool {
    self.required.unwrap_or(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ExecutionShape, Intent, Operator, Value};

  const NESTED_INTENT: &str = r#"{
    "intent_id": "i-1",
    "source": "cli",
    "execution_shape": "chain",
    "steps": [
      {"step_id": "s1", "capability": "echo", "action": "ping", "parameters": {"msg": "hi", "n": 2}},
      {"step_id": "fan", "substeps": [
        {"step_id": "a", "capability": "echo", "action": "ping", "input_from": "s1"},
        {"step_id": "b", "capability": "echo", "action": "ping",
         "condition": {"field": "s1.output.pong", "operator": "eq", "value": "hi"},
         "step_options": {"required": false, "fallback_capability": "echo2"}}
      ]}
    ],
    "options": {"fail_fast": false},
    "context": {"user": 7}
  }"#;

  #[test]
  fn test_group_detected_by_substeps() {
    let intent: Intent = serde_json::from_str(NESTED_INTENT).unwrap();
    assert_eq!(intent.execution_shape, ExecutionShape::Chain);
    assert!(matches!(intent.steps[0], StepDef::Action(_)));

    let StepDef::Group(group) = &intent.steps[1] else {
      panic!("expected a parallel group");
    };
    assert_eq!(group.substeps.len(), 2);

    let StepDef::Action(b) = &group.substeps[1] else {
      panic!("expected an action step");
    };
    assert!(!b.step_options.required());
    let condition = b.condition.as_ref().unwrap();
    assert_eq!(condition.operator, Operator::Eq);
    assert_eq!(condition.value, Some(Value::from("hi")));
  }

  #[test]
  fn test_intent_round_trips_losslessly() {
    let original: serde_json::Value = serde_json::from_str(NESTED_INTENT).unwrap();
    let intent: Intent = serde_json::from_value(original.clone()).unwrap();
    let reserialized = serde_json::to_value(&intent).unwrap();
    assert_eq!(reserialized, original);
    assert_eq!(
      serde_json::to_string(&intent).unwrap(),
      serde_json::to_string(&original).unwrap()
    );
  }

  #[test]
  fn test_field_error_names_the_action_variant() {
    let err = serde_json::from_str::<StepDef>(r#"{"step_id": "s1", "capability": "echo"}"#)
      .unwrap_err()
      .to_string();
    assert!(err.contains("action"), "unexpected error: {err}");
  }

  #[test]
  fn test_step_options_defaults() {
    let options = StepOptions::default();
    assert!(options.required());
    assert!(options.is_default());
  }
}
