use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use conductor_config::Value;
use conductor_template::OutputLookup;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

/// What a step left behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
  pub output: Value,
  /// The capability that actually served the step; the fallback's when one
  /// was used. Absent for parallel groups.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub capability: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub action: Option<String>,
  pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
  /// Absent for intent-level errors (deadline, cancellation).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub step_id: Option<String>,
  pub message: String,
  pub timestamp: DateTime<Utc>,
}

/// Per-run state, owned by a single execution.
///
/// Step outputs are write-once, errors are append-only and the total cost
/// never decreases.
#[derive(Debug)]
pub struct ExecutionContext {
  step_outputs: IndexMap<String, StepRecord>,
  errors: Vec<ErrorEntry>,
  total_cost: f64,
  started_at: Instant,
  failed: bool,
  /// Required steps that failed, plus the steps and groups that could not
  /// run or complete because of one.
  unavailable: HashSet<String>,
}

impl ExecutionContext {
  pub fn new() -> Self {
    Self {
      step_outputs: IndexMap::new(),
      errors: Vec::new(),
      total_cost: 0.0,
      started_at: Instant::now(),
      failed: false,
      unavailable: HashSet::new(),
    }
  }

  /// Record an invocation's result and add its cost to the total.
  ///
  /// Returns false, and changes nothing, if the step already has a record.
  pub fn record(&mut self, step_id: &str, record: StepRecord) -> bool {
    if self.step_outputs.contains_key(step_id) {
      warn!(step_id = %step_id, "step output already recorded, ignoring");
      return false;
    }
    if record.cost.is_finite() && record.cost > 0.0 {
      self.total_cost += record.cost;
    }
    self.step_outputs.insert(step_id.to_string(), record);
    true
  }

  /// Record a parallel group as a map of its members' outputs.
  ///
  /// The group's cost is the sum of its members', which are already part of
  /// the total.
  pub fn record_group(&mut self, step_id: &str, members: IndexMap<String, Value>) -> bool {
    let cost = members
      .keys()
      .filter_map(|member| self.step_outputs.get(member))
      .map(|record| record.cost)
      .sum();

    if self.step_outputs.contains_key(step_id) {
      warn!(step_id = %step_id, "step output already recorded, ignoring");
      return false;
    }
    if members.keys().any(|member| self.unavailable.contains(member)) {
      self.unavailable.insert(step_id.to_string());
    }
    self.step_outputs.insert(
      step_id.to_string(),
      StepRecord {
        output: Value::Map(members),
        capability: None,
        action: None,
        cost,
      },
    );
    true
  }

  pub fn push_error(&mut self, step_id: Option<&str>, message: impl Into<String>) {
    self.errors.push(ErrorEntry {
      step_id: step_id.map(str::to_string),
      message: message.into(),
      timestamp: Utc::now(),
    });
  }

  /// The run was interrupted before its steps were done.
  pub fn mark_failed(&mut self) {
    self.failed = true;
  }

  /// A required step failed. Steps reading its output will not run.
  pub fn fail_step(&mut self, step_id: &str) {
    self.unavailable.insert(step_id.to_string());
    self.failed = true;
  }

  /// The step was not run because something it reads is unavailable.
  pub fn block_step(&mut self, step_id: &str) {
    self.unavailable.insert(step_id.to_string());
  }

  /// The first of `dependencies` that failed or was blocked.
  pub fn unavailable_dependency<'a>(&self, dependencies: &'a [String]) -> Option<&'a str> {
    dependencies
      .iter()
      .find(|dep| self.unavailable.contains(dep.as_str()))
      .map(String::as_str)
  }

  pub fn has_failed(&self) -> bool {
    self.failed
  }

  pub fn get(&self, step_id: &str) -> Option<&StepRecord> {
    self.step_outputs.get(step_id)
  }

  pub fn step_outputs(&self) -> &IndexMap<String, StepRecord> {
    &self.step_outputs
  }

  pub fn errors(&self) -> &[ErrorEntry] {
    &self.errors
  }

  pub fn total_cost(&self) -> f64 {
    self.total_cost
  }

  pub fn elapsed(&self) -> Duration {
    self.started_at.elapsed()
  }

  pub(crate) fn into_parts(self) -> (IndexMap<String, StepRecord>, Vec<ErrorEntry>, f64, Duration) {
    let elapsed = self.elapsed();
    (self.step_outputs, self.errors, self.total_cost, elapsed)
  }
}

impl Default for ExecutionContext {
  fn default() -> Self {
    Self::new()
  }
}

impl OutputLookup for ExecutionContext {
  fn output(&self, step_id: &str) -> Option<&Value> {
    self.step_outputs.get(step_id).map(|record| &record.output)
  }

  fn record_field(&self, step_id: &str, field: &str) -> Option<Value> {
    let record = self.step_outputs.get(step_id)?;
    match field {
      "capability" => record.capability.clone().map(Value::String),
      "action" => record.action.clone().map(Value::String),
      "cost" => Some(Value::from(record.cost)),
      _ => None,
    }
  }
}
