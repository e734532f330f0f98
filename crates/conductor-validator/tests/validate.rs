use std::sync::Arc;
use std::time::Duration;

use conductor_config::{Intent, RetryBackoff};
use conductor_plan::PlannedStep;
use conductor_registry::{CapabilityRegistry, RegistryError};
use conductor_validator::{IntentValidator, RegistryValidator, ValidationError};
use serde_json::json;

fn validator() -> RegistryValidator {
  let registry = CapabilityRegistry::from_json_str(
    &json!({
      "version": "test",
      "capabilities": {
        "echo": {
          "base_url": "http://localhost:8001",
          "actions": {
            "ping": {"endpoint": "/ping", "parameters": ["msg"], "timeout_ms": 1000},
            "shout": {"endpoint": "/shout"}
          }
        },
        "echo2": {
          "base_url": "http://localhost:8002",
          "actions": {
            "ping": {"endpoint": "/ping"},
            "pong": {"endpoint": "/pong"}
          }
        }
      }
    })
    .to_string(),
  )
  .unwrap();
  RegistryValidator::new(Arc::new(registry))
}

fn intent(value: serde_json::Value) -> Intent {
  serde_json::from_value(value).unwrap()
}

fn ping(step_id: &str) -> serde_json::Value {
  json!({"step_id": step_id, "capability": "echo", "action": "ping"})
}

#[test]
fn test_valid_chain_with_group() {
  let intent = intent(json!({
    "intent_id": "i-1",
    "execution_shape": "chain",
    "steps": [
      ping("s1"),
      {"step_id": "fan", "substeps": [
        {"step_id": "a", "capability": "echo", "action": "ping", "input_from": "s1"},
        {"step_id": "b", "capability": "echo", "action": "shout",
         "step_options": {"fallback_capability": "echo2", "fallback_action": "pong", "timeout_ms": 250}}
      ]},
      {"step_id": "s3", "capability": "echo", "action": "ping", "input_from": "a"}
    ],
    "options": {"retries": 2, "retry_backoff": "linear", "retry_initial_delay_ms": 10}
  }));

  let plan = validator().validate(&intent).unwrap();
  assert_eq!(plan.intent_id, "i-1");
  assert_eq!(plan.step_count(), 5);
  assert!(plan.fail_fast);

  let Some(PlannedStep::Invoke(b)) = plan.find("b") else {
    panic!("expected invocation");
  };
  let fallback = b.fallback.as_ref().unwrap();
  assert_eq!((fallback.capability.as_str(), fallback.action.as_str()), ("echo2", "pong"));
  assert_eq!(b.timeout(Duration::from_secs(30)), Duration::from_millis(250));
  assert_eq!(b.retry.retries, 2);
  assert_eq!(b.retry.backoff, RetryBackoff::Linear);
  assert_eq!(b.retry.delay(2), Duration::from_millis(20));
}

#[test]
fn test_generates_intent_id() {
  let intent = intent(json!({"execution_shape": "single", "steps": [ping("s1")]}));
  let plan = validator().validate(&intent).unwrap();
  assert!(!plan.intent_id.is_empty());
  assert!(validator().validate_all(&intent).is_empty());
}

#[test]
fn test_empty_intent() {
  let intent = intent(json!({"execution_shape": "chain", "steps": []}));
  assert!(matches!(
    validator().validate(&intent),
    Err(ValidationError::EmptyIntent)
  ));
}

#[test]
fn test_single_requires_exactly_one_step() {
  let intent = intent(json!({"execution_shape": "single", "steps": [ping("s1"), ping("s2")]}));
  assert!(matches!(
    validator().validate(&intent),
    Err(ValidationError::SingleShapeStepCount { count: 2 })
  ));
}

#[test]
fn test_duplicate_nested_step_id() {
  let intent = intent(json!({
    "execution_shape": "chain",
    "steps": [ping("s1"), {"step_id": "fan", "substeps": [ping("a"), ping("s1")]}]
  }));
  let err = validator().validate(&intent).unwrap_err();
  assert!(matches!(err, ValidationError::DuplicateStepId { ref step_id } if step_id == "s1"));
}

#[test]
fn test_unknown_capability_and_action() {
  let intent = intent(json!({
    "execution_shape": "chain",
    "steps": [
      ping("s1"),
      {"step_id": "s2", "capability": "nope", "action": "ping"},
      {"step_id": "s3", "capability": "echo", "action": "nope"}
    ]
  }));

  let issues = validator().validate_all(&intent);
  assert_eq!(issues.len(), 2);
  assert!(matches!(
    &issues[0],
    ValidationError::UnresolvedAction { step_id, source: RegistryError::CapabilityNotFound { .. } } if step_id == "s2"
  ));
  assert!(matches!(
    &issues[1],
    ValidationError::UnresolvedAction { step_id, source: RegistryError::ActionNotFound { .. } } if step_id == "s3"
  ));

  // validate names the first offending step.
  let err = validator().validate(&intent).unwrap_err();
  assert_eq!(err.step_id(), Some("s2"));
}

#[test]
fn test_fallback_must_resolve() {
  // echo2 has no `shout`, and the fallback action defaults to the step's.
  let intent = intent(json!({
    "execution_shape": "single",
    "steps": [{"step_id": "s1", "capability": "echo", "action": "shout",
      "step_options": {"fallback_capability": "echo2"}}]
  }));
  assert!(matches!(
    validator().validate(&intent),
    Err(ValidationError::UnresolvedFallback { .. })
  ));

  let orphan = intent_with_options(json!({"fallback_action": "pong"}));
  assert!(matches!(
    validator().validate(&orphan),
    Err(ValidationError::FallbackWithoutCapability { .. })
  ));
}

fn intent_with_options(step_options: serde_json::Value) -> Intent {
  intent(json!({
    "execution_shape": "single",
    "steps": [{"step_id": "s1", "capability": "echo", "action": "ping", "step_options": step_options}]
  }))
}

#[test]
fn test_forward_and_unknown_references() {
  let forward = intent(json!({
    "execution_shape": "chain",
    "steps": [
      {"step_id": "s1", "capability": "echo", "action": "ping", "input_from": "s2"},
      ping("s2")
    ]
  }));
  assert!(matches!(
    validator().validate(&forward),
    Err(ValidationError::ForwardReference { .. })
  ));

  let unknown = intent(json!({
    "execution_shape": "chain",
    "steps": [{"step_id": "s1", "capability": "echo", "action": "ping", "input_from": "ghost"}]
  }));
  assert!(matches!(
    validator().validate(&unknown),
    Err(ValidationError::UnknownReference { .. })
  ));
}

#[test]
fn test_sibling_references_rejected() {
  let in_group = intent(json!({
    "execution_shape": "chain",
    "steps": [{"step_id": "fan", "substeps": [
      ping("a"),
      {"step_id": "inner", "substeps": [
        {"step_id": "b", "capability": "echo", "action": "ping", "input_from": "a"}
      ]}
    ]}]
  }));
  assert!(matches!(
    validator().validate(&in_group),
    Err(ValidationError::SiblingReference { ref reference, .. }) if reference == "a"
  ));

  let top_level = intent(json!({
    "execution_shape": "parallel",
    "steps": [ping("a"), {"step_id": "b", "capability": "echo", "action": "ping", "input_from": "a"}]
  }));
  assert!(matches!(
    validator().validate(&top_level),
    Err(ValidationError::SiblingReference { .. })
  ));
}

#[test]
fn test_result_step_and_timeouts() {
  let intent_value = json!({
    "execution_shape": "chain",
    "steps": [{"step_id": "s1", "capability": "echo", "action": "ping", "step_options": {"timeout_ms": 0}}],
    "options": {"timeout_ms": 0},
    "result_step": "nope"
  });
  let issues = validator().validate_all(&intent(intent_value));
  assert_eq!(issues.len(), 3);
  assert!(matches!(&issues[0], ValidationError::InvalidTimeout { scope } if scope == "intent"));
  assert!(matches!(&issues[1], ValidationError::InvalidTimeout { .. }));
  assert!(matches!(&issues[2], ValidationError::UnknownResultStep { .. }));
}
