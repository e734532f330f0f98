use std::sync::Arc;
use std::time::Duration;

use conductor_config::{Condition, Value, ValueMap};
use conductor_registry::ActionTemplate;
use conductor_template::Template;

use crate::retry::RetryPolicy;

/// A resolved step: one invocation, or a group of concurrent substeps.
#[derive(Debug, Clone)]
pub enum PlannedStep {
  Invoke(PlannedInvocation),
  Group(PlannedGroup),
}

impl PlannedStep {
  pub fn step_id(&self) -> &str {
    match self {
      PlannedStep::Invoke(invocation) => &invocation.step_id,
      PlannedStep::Group(group) => &group.step_id,
    }
  }

  pub fn condition(&self) -> Option<&Condition> {
    match self {
      PlannedStep::Invoke(invocation) => invocation.condition.as_ref(),
      PlannedStep::Group(group) => group.condition.as_ref(),
    }
  }

  /// Number of steps, counting a group and each of its members.
  pub fn count(&self) -> usize {
    match self {
      PlannedStep::Invoke(_) => 1,
      PlannedStep::Group(group) => 1 + group.substeps.iter().map(PlannedStep::count).sum::<usize>(),
    }
  }
}

/// Substitute invocation used when the primary times out or is unreachable.
pub type FallbackTarget = Arc<ActionTemplate>;

#[derive(Debug, Clone)]
pub struct PlannedInvocation {
  pub step_id: String,
  pub target: Arc<ActionTemplate>,
  pub parameters: ValueMap,
  pub input_from: Option<String>,
  pub input_template: Option<Template>,
  pub condition: Option<Condition>,
  /// Per-step override; see [`PlannedInvocation::timeout`].
  pub timeout_override: Option<Duration>,
  pub required: bool,
  pub fallback: Option<FallbackTarget>,
  pub retry: RetryPolicy,
}

impl PlannedInvocation {
  /// Step override, else the action's default, else the intent ceiling.
  pub fn timeout(&self, ceiling: Duration) -> Duration {
    self
      .timeout_override
      .or_else(|| self.target.default_timeout())
      .unwrap_or(ceiling)
  }

  pub fn capability(&self) -> &str {
    &self.target.capability
  }

  pub fn action(&self) -> &str {
    &self.target.action
  }

  /// Steps whose output this invocation reads, through `input_from`,
  /// `input_template` or a placeholder in its parameters. Conditions are not
  /// counted: a condition may test a failed step's marker on purpose.
  pub fn dependencies(&self) -> Vec<String> {
    let mut deps: Vec<String> = Vec::new();
    let mut add = |step_id: &str| {
      if !deps.iter().any(|d| d == step_id) {
        deps.push(step_id.to_string());
      }
    };

    if let Some(source) = &self.input_from {
      add(source);
    }
    if let Some(template) = &self.input_template {
      template.referenced_steps().for_each(&mut add);
    }
    for value in self.parameters.values() {
      placeholder_steps(value, &mut add);
    }
    deps
  }
}

fn placeholder_steps(value: &Value, add: &mut impl FnMut(&str)) {
  match value {
    Value::String(s) if s.contains("{{") => Template::parse(s).referenced_steps().for_each(add),
    Value::List(items) => items.iter().for_each(|item| placeholder_steps(item, add)),
    Value::Map(map) => map.values().for_each(|item| placeholder_steps(item, add)),
    _ => {}
  }
}

#[derive(Debug, Clone)]
pub struct PlannedGroup {
  pub step_id: String,
  pub substeps: Vec<PlannedStep>,
  pub condition: Option<Condition>,
}
