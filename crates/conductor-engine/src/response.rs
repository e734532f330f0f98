use conductor_config::{ExecutionShape, Value};
use conductor_plan::{Plan, PlannedStep};
use indexmap::IndexMap;
use serde::Serialize;

use crate::context::{ErrorEntry, ExecutionContext, StepRecord};
use crate::redact::redact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
  Completed,
  Failed,
}

impl IntentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      IntentStatus::Completed => "completed",
      IntentStatus::Failed => "failed",
    }
  }
}

impl std::fmt::Display for IntentStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The unified result of one intent execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
  pub intent_id: String,
  pub status: IntentStatus,
  pub duration_ms: u64,
  pub total_cost: f64,
  /// Every step that was scheduled, in the order it was recorded.
  pub step_outputs: IndexMap<String, StepRecord>,
  /// `None` when nothing went wrong.
  pub errors: Option<Vec<ErrorEntry>>,
  pub result: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context: Option<Value>,
}

impl Response {
  pub fn is_completed(&self) -> bool {
    self.status == IntentStatus::Completed
  }

  /// Output recorded for a step.
  pub fn output(&self, step_id: &str) -> Option<&Value> {
    self.step_outputs.get(step_id).map(|record| &record.output)
  }
}

/// Fold a finished run into its response.
pub fn aggregate(plan: &Plan, ctx: ExecutionContext) -> Response {
  let status = if ctx.has_failed() {
    IntentStatus::Failed
  } else {
    IntentStatus::Completed
  };
  let result = select_result(plan, &ctx);
  let (step_outputs, errors, total_cost, elapsed) = ctx.into_parts();

  let errors: Vec<ErrorEntry> = errors
    .into_iter()
    .map(|entry| ErrorEntry {
      message: redact(&entry.message),
      ..entry
    })
    .collect();

  Response {
    intent_id: plan.intent_id.clone(),
    status,
    duration_ms: elapsed.as_millis() as u64,
    total_cost,
    step_outputs,
    errors: (!errors.is_empty()).then_some(errors),
    result,
    context: plan.context.clone(),
  }
}

/// The explicit `result_step` if given, otherwise a shape-dependent default.
fn select_result(plan: &Plan, ctx: &ExecutionContext) -> Value {
  let output_of = |step_id: &str| ctx.get(step_id).map(|record| record.output.clone());

  if let Some(step_id) = &plan.result_step {
    return output_of(step_id).unwrap_or_default();
  }

  match plan.shape {
    ExecutionShape::Parallel => Value::Map(
      plan
        .steps
        .iter()
        .filter_map(|step| output_of(step.step_id()).map(|output| (step.step_id().to_string(), output)))
        .collect(),
    ),
    ExecutionShape::Single | ExecutionShape::Chain | ExecutionShape::Conditional => plan
      .steps
      .iter()
      .rev()
      .find_map(|step: &PlannedStep| output_of(step.step_id()))
      .unwrap_or_default(),
  }
}
