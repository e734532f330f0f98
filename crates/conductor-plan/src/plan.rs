use std::time::Duration;

use conductor_config::{ExecutionShape, Value};

use crate::step::PlannedStep;

/// A validated intent ready for execution.
#[derive(Debug, Clone)]
pub struct Plan {
  pub intent_id: String,
  pub source: Option<String>,
  pub shape: ExecutionShape,
  pub steps: Vec<PlannedStep>,
  /// Intent-level ceiling; the engine default applies when absent.
  pub timeout: Option<Duration>,
  pub fail_fast: bool,
  pub context: Option<Value>,
  pub result_step: Option<String>,
}

impl Plan {
  /// Total number of steps, including groups and their members.
  pub fn step_count(&self) -> usize {
    self.steps.iter().map(PlannedStep::count).sum()
  }

  /// Find a step anywhere in the plan.
  pub fn find(&self, step_id: &str) -> Option<&PlannedStep> {
    fn search<'a>(steps: &'a [PlannedStep], step_id: &str) -> Option<&'a PlannedStep> {
      for step in steps {
        if step.step_id() == step_id {
          return Some(step);
        }
        if let PlannedStep::Group(group) = step
          && let Some(found) = search(&group.substeps, step_id)
        {
          return Some(found);
        }
      }
      None
    }

    search(&self.steps, step_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  use conductor_registry::{ActionTemplate, Method};

  use crate::retry::RetryPolicy;
  use crate::step::{PlannedGroup, PlannedInvocation};

  fn invoke(step_id: &str) -> PlannedStep {
    PlannedStep::Invoke(PlannedInvocation {
      step_id: step_id.to_string(),
      target: Arc::new(ActionTemplate {
        capability: "echo".to_string(),
        action: "ping".to_string(),
        base_url: "http://localhost:8001".to_string(),
        endpoint: "/ping".to_string(),
        method: Method::Post,
        parameters: vec![],
        timeout_ms: Some(500),
      }),
      parameters: Default::default(),
      input_from: None,
      input_template: None,
      condition: None,
      timeout_override: None,
      required: true,
      fallback: None,
      retry: RetryPolicy::default(),
    })
  }

  #[test]
  fn test_step_count_and_find_nested() {
    let plan = Plan {
      intent_id: "i-1".to_string(),
      source: None,
      shape: ExecutionShape::Chain,
      steps: vec![
        invoke("s1"),
        PlannedStep::Group(PlannedGroup {
          step_id: "fan".to_string(),
          substeps: vec![invoke("a"), invoke("b")],
          condition: None,
        }),
      ],
      timeout: None,
      fail_fast: true,
      context: None,
      result_step: None,
    };

    assert_eq!(plan.step_count(), 4);
    assert_eq!(plan.find("b").map(PlannedStep::step_id), Some("b"));
    assert!(plan.find("missing").is_none());

    let Some(PlannedStep::Invoke(s1)) = plan.find("s1") else {
      panic!("expected invocation");
    };
    assert_eq!(s1.timeout(Duration::from_secs(30)), Duration::from_millis(500));
  }
}
