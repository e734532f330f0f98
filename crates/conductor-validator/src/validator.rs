use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use conductor_config::{ActionStepDef, ExecutionShape, Intent, IntentOptions, ParallelGroupDef, StepDef};
use conductor_plan::{
  FallbackTarget, Plan, PlannedGroup, PlannedInvocation, PlannedStep, RetryPolicy,
};
use conductor_registry::{ActionTemplate, CapabilityRegistry};
use conductor_template::Template;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ValidationError;

/// Turns a submitted [`Intent`] into an executable [`Plan`].
pub trait IntentValidator: Send + Sync {
  /// Validate an intent and resolve it into a plan.
  ///
  /// Every step is inspected, but only the first issue found is returned.
  fn validate(&self, intent: &Intent) -> Result<Plan, ValidationError>;

  /// Every issue found in the intent, in step order. Empty when valid.
  fn validate_all(&self, intent: &Intent) -> Vec<ValidationError>;
}

/// Validator that resolves actions against a [`CapabilityRegistry`].
pub struct RegistryValidator {
  registry: Arc<CapabilityRegistry>,
}

impl RegistryValidator {
  pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
    Self { registry }
  }

  pub fn registry(&self) -> &Arc<CapabilityRegistry> {
    &self.registry
  }

  /// Build the plan and collect every issue along the way. The plan is only
  /// meaningful when no issues were found.
  fn check(&self, intent: &Intent) -> (Plan, Vec<ValidationError>) {
    let mut planner = Planner::new(&self.registry, intent);

    if intent.steps.is_empty() {
      planner.issues.push(ValidationError::EmptyIntent);
    } else if intent.execution_shape == ExecutionShape::Single && intent.steps.len() != 1 {
      planner.issues.push(ValidationError::SingleShapeStepCount {
        count: intent.steps.len(),
      });
    }

    if intent.options.timeout_ms == Some(0) {
      planner.issues.push(ValidationError::InvalidTimeout {
        scope: "intent".to_string(),
      });
    }

    let steps = match intent.execution_shape {
      ExecutionShape::Parallel => planner.concurrent(&intent.steps, &HashSet::new(), None),
      _ => planner.sequence(&intent.steps, &mut HashSet::new()),
    };

    if let Some(result_step) = &intent.result_step
      && !planner.all_ids.contains(result_step.as_str())
    {
      planner.issues.push(ValidationError::UnknownResultStep {
        step_id: result_step.clone(),
      });
    }

    let intent_id = intent
      .intent_id
      .clone()
      .filter(|id| !id.is_empty())
      .unwrap_or_else(|| Uuid::new_v4().to_string());

    let plan = Plan {
      intent_id,
      source: intent.source.clone(),
      shape: intent.execution_shape,
      steps,
      timeout: intent.options.timeout_ms.map(Duration::from_millis),
      fail_fast: intent.options.fail_fast(),
      context: intent.context.clone(),
      result_step: intent.result_step.clone(),
    };

    (plan, planner.issues)
  }
}

impl IntentValidator for RegistryValidator {
  fn validate(&self, intent: &Intent) -> Result<Plan, ValidationError> {
    let (plan, issues) = self.check(intent);
    match issues.into_iter().next() {
      Some(first) => Err(first),
      None => {
        debug!(
          intent_id = %plan.intent_id,
          step_count = plan.step_count(),
          "intent validated"
        );
        Ok(plan)
      }
    }
  }

  fn validate_all(&self, intent: &Intent) -> Vec<ValidationError> {
    self.check(intent).1
  }
}

/// One walk over an intent's steps.
struct Planner<'a> {
  registry: &'a CapabilityRegistry,
  options: &'a IntentOptions,
  all_ids: HashSet<&'a str>,
  seen: HashSet<&'a str>,
  issues: Vec<ValidationError>,
}

impl<'a> Planner<'a> {
  fn new(registry: &'a CapabilityRegistry, intent: &'a Intent) -> Self {
    let mut all_ids = HashSet::new();
    for step in &intent.steps {
      collect_ids(step, &mut all_ids);
    }

    Self {
      registry,
      options: &intent.options,
      all_ids,
      seen: HashSet::new(),
      issues: Vec::new(),
    }
  }

  /// Steps that run one after another; each sees everything before it.
  fn sequence(
    &mut self,
    steps: &'a [StepDef],
    available: &mut HashSet<&'a str>,
  ) -> Vec<PlannedStep> {
    let mut planned = Vec::with_capacity(steps.len());
    for step in steps {
      if let Some(step) = self.step(step, available, None) {
        planned.push(step);
      }
      collect_ids(step, available);
    }
    planned
  }

  /// Steps that run concurrently; they only see what ran before the group.
  fn concurrent(
    &mut self,
    steps: &'a [StepDef],
    available: &HashSet<&'a str>,
    siblings: Option<&HashSet<&'a str>>,
  ) -> Vec<PlannedStep> {
    // Nested groups share the outermost group's sibling set.
    let owned;
    let siblings = match siblings {
      Some(siblings) => siblings,
      None => {
        let mut ids = HashSet::new();
        for step in steps {
          collect_ids(step, &mut ids);
        }
        owned = ids;
        &owned
      }
    };

    let mut planned = Vec::with_capacity(steps.len());
    for step in steps {
      if let Some(step) = self.step(step, available, Some(siblings)) {
        planned.push(step);
      }
    }
    planned
  }

  fn step(
    &mut self,
    step: &'a StepDef,
    available: &HashSet<&'a str>,
    siblings: Option<&HashSet<&'a str>>,
  ) -> Option<PlannedStep> {
    let step_id = step.step_id();
    if !self.seen.insert(step_id) {
      self.issues.push(ValidationError::DuplicateStepId {
        step_id: step_id.to_string(),
      });
    }

    match step {
      StepDef::Group(group) => Some(PlannedStep::Group(self.group(group, available, siblings))),
      StepDef::Action(action) => self
        .invocation(action, available, siblings)
        .map(PlannedStep::Invoke),
    }
  }

  fn group(
    &mut self,
    group: &'a ParallelGroupDef,
    available: &HashSet<&'a str>,
    siblings: Option<&HashSet<&'a str>>,
  ) -> PlannedGroup {
    if group.substeps.is_empty() {
      self.issues.push(ValidationError::EmptyGroup {
        step_id: group.step_id.clone(),
      });
    }

    PlannedGroup {
      step_id: group.step_id.clone(),
      substeps: self.concurrent(&group.substeps, available, siblings),
      condition: group.condition.clone(),
    }
  }

  fn invocation(
    &mut self,
    step: &'a ActionStepDef,
    available: &HashSet<&'a str>,
    siblings: Option<&HashSet<&'a str>>,
  ) -> Option<PlannedInvocation> {
    if let Some(reference) = &step.input_from {
      self.check_reference(&step.step_id, reference, available, siblings);
    }

    let target = match self.registry.resolve(&step.capability, &step.action) {
      Ok(target) => Some(Arc::clone(target)),
      Err(source) => {
        self.issues.push(ValidationError::UnresolvedAction {
          step_id: step.step_id.clone(),
          source,
        });
        None
      }
    };
    let fallback = self.fallback(step);

    if step.step_options.timeout_ms == Some(0) {
      self.issues.push(ValidationError::InvalidTimeout {
        scope: format!("step '{}'", step.step_id),
      });
    }

    let target = target?;
    warn_undeclared(step, &target);

    let input_template = step.input_template.as_deref().map(Template::parse);
    if let Some(template) = &input_template {
      for referenced in template.referenced_steps() {
        if !available.contains(referenced) {
          warn!(
            step_id = %step.step_id,
            referenced_step = %referenced,
            "input template references a step that has not run"
          );
        }
      }
    }

    let options = &step.step_options;
    Some(PlannedInvocation {
      step_id: step.step_id.clone(),
      target,
      parameters: step.parameters.clone(),
      input_from: step.input_from.clone(),
      input_template,
      condition: step.condition.clone(),
      timeout_override: options.timeout_ms.map(Duration::from_millis),
      required: options.required(),
      fallback,
      retry: RetryPolicy {
        retries: options.retries.or(self.options.retries).unwrap_or(0),
        backoff: self.options.retry_backoff.unwrap_or_default(),
        initial_delay: Duration::from_millis(self.options.retry_initial_delay_ms.unwrap_or(0)),
      },
    })
  }

  fn fallback(&mut self, step: &ActionStepDef) -> Option<FallbackTarget> {
    let options = &step.step_options;
    let Some(capability) = &options.fallback_capability else {
      if options.fallback_action.is_some() {
        self.issues.push(ValidationError::FallbackWithoutCapability {
          step_id: step.step_id.clone(),
        });
      }
      return None;
    };

    let action = options.fallback_action.as_deref().unwrap_or(&step.action);
    match self.registry.resolve(capability, action) {
      Ok(target) => Some(Arc::clone(target)),
      Err(source) => {
        self.issues.push(ValidationError::UnresolvedFallback {
          step_id: step.step_id.clone(),
          source,
        });
        None
      }
    }
  }

  fn check_reference(
    &mut self,
    step_id: &str,
    reference: &str,
    available: &HashSet<&'a str>,
    siblings: Option<&HashSet<&'a str>>,
  ) {
    if available.contains(reference) {
      return;
    }

    let step_id = step_id.to_string();
    let reference = reference.to_string();
    let issue = if siblings.is_some_and(|ids| ids.contains(reference.as_str())) {
      ValidationError::SiblingReference { step_id, reference }
    } else if self.all_ids.contains(reference.as_str()) {
      ValidationError::ForwardReference { step_id, reference }
    } else {
      ValidationError::UnknownReference { step_id, reference }
    };
    self.issues.push(issue);
  }
}

/// Add a step's id, and the ids of everything nested in it.
fn collect_ids<'a>(step: &'a StepDef, ids: &mut HashSet<&'a str>) {
  ids.insert(step.step_id());
  if let StepDef::Group(group) = step {
    for substep in &group.substeps {
      collect_ids(substep, ids);
    }
  }
}

fn warn_undeclared(step: &ActionStepDef, target: &ActionTemplate) {
  // Actions that declare no parameters accept anything.
  if target.parameters.is_empty() {
    return;
  }
  for name in step.parameters.keys() {
    if !target.accepts(name) {
      warn!(
        step_id = %step.step_id,
        capability = %target.capability,
        action = %target.action,
        parameter = %name,
        "undeclared parameter"
      );
    }
  }
}
