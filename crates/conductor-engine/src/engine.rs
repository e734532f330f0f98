//! Intent execution engine.
//!
//! The `ExecutionEngine` validates an intent into a plan, walks the plan in
//! its execution shape and folds the run into a `Response`. Chains run one
//! step at a time; parallel groups fan out into spawned tasks that are joined
//! before the group is recorded.
//!
//! A failed required step never has its output read: steps that depend on it
//! are skipped without being invoked, and so are their own dependents.

use std::sync::Arc;
use std::time::Duration;

use conductor_audit::{AuditEvent, AuditSink, NoopAuditSink};
use conductor_client::{CapabilityClient, Invocation};
use conductor_config::{ExecutionShape, Intent, Value};
use conductor_plan::{Plan, PlannedInvocation, PlannedStep};
use conductor_registry::CapabilityRegistry;
use conductor_template::{evaluate, resolve_parameters, resolve_template, unresolved_marker};
use conductor_validator::{IntentValidator, RegistryValidator, ValidationError};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::context::{ExecutionContext, StepRecord};
use crate::invoke::{CallOutcome, PreparedCall, perform};
use crate::redact::redact;
use crate::response::{Response, aggregate};

/// Why a run stopped before its steps were done.
#[derive(Debug, Clone, Copy)]
enum Interrupt {
  Deadline(Duration),
  Cancelled,
}

/// Settings fixed for the duration of one run.
struct RunSettings {
  intent_id: String,
  fail_fast: bool,
  /// Step timeout used when neither the step nor its action sets one.
  step_ceiling: Duration,
}

/// A group member that passed its condition, waiting on its outcome.
enum Member {
  /// Index into the group's prepared calls.
  Call(usize),
  Group { step_id: String, members: Vec<Member> },
}

/// The intent execution engine.
///
/// Generic over `C: CapabilityClient` for invocations and `A: AuditSink` for
/// audit events. Use `ExecutionEngine::new()` to discard audit events, or
/// `ExecutionEngine::with_audit()` to publish them.
pub struct ExecutionEngine<C, A = NoopAuditSink>
where
  C: CapabilityClient + 'static,
  A: AuditSink,
{
  validator: Arc<dyn IntentValidator>,
  client: Arc<C>,
  audit: A,
  config: EngineConfig,
}

impl<C> ExecutionEngine<C, NoopAuditSink>
where
  C: CapabilityClient + 'static,
{
  pub fn new(validator: Arc<dyn IntentValidator>, client: Arc<C>, config: EngineConfig) -> Self {
    Self::with_audit(validator, client, config, NoopAuditSink)
  }

  /// An engine validating against `registry`.
  pub fn from_registry(
    registry: Arc<CapabilityRegistry>,
    client: Arc<C>,
    config: EngineConfig,
  ) -> Self {
    Self::new(Arc::new(RegistryValidator::new(registry)), client, config)
  }
}

impl<C, A> ExecutionEngine<C, A>
where
  C: CapabilityClient + 'static,
  A: AuditSink,
{
  pub fn with_audit(
    validator: Arc<dyn IntentValidator>,
    client: Arc<C>,
    config: EngineConfig,
    audit: A,
  ) -> Self {
    Self {
      validator,
      client,
      audit,
      config,
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Execute an intent.
  ///
  /// Returns `Err` only when the intent fails validation, before anything is
  /// invoked or published. Every validated intent yields a `Response`, with
  /// invocation failures, timeouts and cancellation reported in it.
  #[instrument(
    name = "execute",
    skip_all,
    fields(intent_id = tracing::field::Empty, shape = %intent.execution_shape)
  )]
  pub async fn execute(
    &self,
    intent: &Intent,
    cancel: CancellationToken,
  ) -> Result<Response, ValidationError> {
    info!(
      intent_id = intent.intent_id.as_deref().unwrap_or("-"),
      step_count = intent.steps.len(),
      "intent_validating"
    );

    let plan = match self.validator.validate(intent) {
      Ok(plan) => plan,
      Err(e) => {
        warn!(error = %e, "intent rejected");
        return Err(e);
      }
    };
    Span::current().record("intent_id", plan.intent_id.as_str());

    let settings = RunSettings {
      intent_id: plan.intent_id.clone(),
      fail_fast: plan.fail_fast,
      step_ceiling: plan.timeout.unwrap_or(self.config.default_step_timeout),
    };
    let deadline = plan.timeout.unwrap_or(self.config.default_intent_timeout);

    self.audit.publish(AuditEvent::OrchestrationStarted {
      intent_id: plan.intent_id.clone(),
      source: plan.source.clone(),
      shape: plan.shape,
      step_count: plan.step_count(),
    });
    info!(
      intent_id = %plan.intent_id,
      source = plan.source.as_deref().unwrap_or("-"),
      step_count = plan.step_count(),
      deadline_ms = deadline.as_millis() as u64,
      "intent_started"
    );

    let mut ctx = ExecutionContext::new();
    let run_cancel = cancel.child_token();

    let interrupt = {
      let run = self.run_plan(&settings, &plan, &mut ctx, &run_cancel);
      tokio::pin!(run);

      let interrupt = tokio::select! {
        biased;
        _ = &mut run => None,
        _ = cancel.cancelled() => Some(Interrupt::Cancelled),
        _ = tokio::time::sleep(deadline) => Some(Interrupt::Deadline(deadline)),
      };

      // Let in-flight work observe the cancellation and record itself.
      if interrupt.is_some() {
        run_cancel.cancel();
        run.await;
      }
      // The run may have wound down on a parent cancel before it was seen.
      interrupt.or_else(|| cancel.is_cancelled().then_some(Interrupt::Cancelled))
    };

    if let Some(interrupt) = interrupt {
      let message = match interrupt {
        Interrupt::Deadline(deadline) => {
          format!("intent timed out after {}ms", deadline.as_millis())
        }
        Interrupt::Cancelled => "intent cancelled".to_string(),
      };
      error!(intent_id = %plan.intent_id, error = %message, "intent interrupted");
      ctx.push_error(None, message);
      ctx.mark_failed();
    }

    let response = aggregate(&plan, ctx);
    let error_count = response.errors.as_ref().map_or(0, Vec::len);

    self.audit.publish(AuditEvent::OrchestrationCompleted {
      intent_id: response.intent_id.clone(),
      status: response.status.as_str().to_string(),
      duration_ms: response.duration_ms,
      total_cost: response.total_cost,
      error_count,
    });

    if response.is_completed() {
      info!(
        intent_id = %response.intent_id,
        duration_ms = response.duration_ms,
        total_cost = response.total_cost,
        steps_recorded = response.step_outputs.len(),
        "intent_completed"
      );
    } else {
      error!(
        intent_id = %response.intent_id,
        duration_ms = response.duration_ms,
        total_cost = response.total_cost,
        error_count,
        "intent_failed"
      );
    }

    Ok(response)
  }

  async fn run_plan(
    &self,
    settings: &RunSettings,
    plan: &Plan,
    ctx: &mut ExecutionContext,
    cancel: &CancellationToken,
  ) {
    match plan.shape {
      ExecutionShape::Parallel => {
        self.run_concurrent(settings, &plan.steps, ctx, cancel).await;
      }
      ExecutionShape::Single | ExecutionShape::Chain | ExecutionShape::Conditional => {
        self.run_sequence(settings, &plan.steps, ctx, cancel).await;
      }
    }
  }

  /// Run steps strictly in order. Step N+1 is not dispatched before step N
  /// is recorded or skipped.
  async fn run_sequence(
    &self,
    settings: &RunSettings,
    steps: &[PlannedStep],
    ctx: &mut ExecutionContext,
    cancel: &CancellationToken,
  ) {
    for step in steps {
      if cancel.is_cancelled() {
        break;
      }
      if !self.should_run(settings, step, ctx) {
        continue;
      }

      match step {
        PlannedStep::Invoke(planned) => {
          if self.blocked(settings, planned, ctx) {
            continue;
          }
          let call = prepare_call(settings, planned, ctx);
          log_step_started(settings, &call);
          let outcome = perform(self.client.as_ref(), &call, cancel, cancel).await;
          self.record_call(settings, &call, outcome, ctx);
        }
        PlannedStep::Group(group) => {
          info!(
            intent_id = %settings.intent_id,
            step_id = %group.step_id,
            members = group.substeps.len(),
            "step_started"
          );
          let members = self.run_concurrent(settings, &group.substeps, ctx, cancel).await;
          ctx.record_group(&group.step_id, members);
          info!(intent_id = %settings.intent_id, step_id = %group.step_id, "step_completed");
        }
      }

      if settings.fail_fast && ctx.has_failed() {
        warn!(
          intent_id = %settings.intent_id,
          step_id = %step.step_id(),
          "required step failed, remaining steps not scheduled"
        );
        break;
      }
    }
  }

  /// Run steps concurrently, nested groups included. Every member resolves
  /// its parameters against the context as it was before the group started.
  ///
  /// A required member failing under fail-fast abandons its siblings: the
  /// requests they already sent finish and are recorded, but no retry or
  /// fallback is started.
  ///
  /// Returns the outputs of the direct members that ran, keyed by step id.
  async fn run_concurrent(
    &self,
    settings: &RunSettings,
    steps: &[PlannedStep],
    ctx: &mut ExecutionContext,
    cancel: &CancellationToken,
  ) -> IndexMap<String, Value> {
    let mut calls = Vec::new();
    let members = self.prepare_members(settings, steps, ctx, &mut calls);

    let abandon = cancel.child_token();
    let mut handles = Vec::with_capacity(calls.len());
    for call in &calls {
      log_step_started(settings, call);

      let client = Arc::clone(&self.client);
      let call = call.clone();
      let cancel = cancel.clone();
      let abandon = abandon.clone();
      let fail_fast = settings.fail_fast;

      handles.push(tokio::spawn(async move {
        let outcome = perform(client.as_ref(), &call, &cancel, &abandon).await;
        if fail_fast && call.required && outcome.is_failed() {
          abandon.cancel();
        }
        outcome
      }));
    }

    let results = futures::future::join_all(handles).await;

    let mut slots: Vec<Option<(PreparedCall, CallOutcome)>> = calls
      .into_iter()
      .zip(results)
      .map(|(call, result)| {
        let outcome = result.unwrap_or_else(|e| CallOutcome::Failed {
          message: format!("invocation task failed: {}", e),
        });
        Some((call, outcome))
      })
      .collect();

    self.fold_members(settings, members, &mut slots, ctx)
  }

  fn prepare_members(
    &self,
    settings: &RunSettings,
    steps: &[PlannedStep],
    ctx: &mut ExecutionContext,
    calls: &mut Vec<PreparedCall>,
  ) -> Vec<Member> {
    let mut members = Vec::with_capacity(steps.len());
    for step in steps {
      if !self.should_run(settings, step, ctx) {
        continue;
      }
      match step {
        PlannedStep::Invoke(planned) => {
          if self.blocked(settings, planned, ctx) {
            continue;
          }
          calls.push(prepare_call(settings, planned, ctx));
          members.push(Member::Call(calls.len() - 1));
        }
        PlannedStep::Group(group) => members.push(Member::Group {
          step_id: group.step_id.clone(),
          members: self.prepare_members(settings, &group.substeps, ctx, calls),
        }),
      }
    }
    members
  }

  /// Record outcomes in member order, building nested group maps bottom-up.
  fn fold_members(
    &self,
    settings: &RunSettings,
    members: Vec<Member>,
    slots: &mut [Option<(PreparedCall, CallOutcome)>],
    ctx: &mut ExecutionContext,
  ) -> IndexMap<String, Value> {
    let mut outputs = IndexMap::with_capacity(members.len());
    for member in members {
      match member {
        Member::Call(index) => {
          if let Some((call, outcome)) = slots.get_mut(index).and_then(Option::take) {
            let output = self.record_call(settings, &call, outcome, ctx);
            outputs.insert(call.step_id().to_string(), output);
          }
        }
        Member::Group { step_id, members } => {
          let nested = self.fold_members(settings, members, slots, ctx);
          ctx.record_group(&step_id, nested.clone());
          outputs.insert(step_id, Value::Map(nested));
        }
      }
    }
    outputs
  }

  fn should_run(&self, settings: &RunSettings, step: &PlannedStep, ctx: &ExecutionContext) -> bool {
    let Some(condition) = step.condition() else {
      return true;
    };
    let met = evaluate(condition, ctx);
    if !met {
      info!(
        intent_id = %settings.intent_id,
        step_id = %step.step_id(),
        field = %condition.field,
        "step_skipped"
      );
    }
    met
  }

  /// Whether `planned` reads from a failed required step, directly or through
  /// a step already skipped for that reason. A blocked step is not invoked
  /// and leaves no output.
  fn blocked(
    &self,
    settings: &RunSettings,
    planned: &PlannedInvocation,
    ctx: &mut ExecutionContext,
  ) -> bool {
    let dependencies = planned.dependencies();
    let Some(dependency) = ctx.unavailable_dependency(&dependencies) else {
      return false;
    };
    warn!(
      intent_id = %settings.intent_id,
      step_id = %planned.step_id,
      dependency = %dependency,
      "step_blocked"
    );
    ctx.block_step(&planned.step_id);
    true
  }

  /// Write a call's outcome into the context. Returns the recorded output.
  fn record_call(
    &self,
    settings: &RunSettings,
    call: &PreparedCall,
    outcome: CallOutcome,
    ctx: &mut ExecutionContext,
  ) -> Value {
    let step_id = call.step_id();

    let failure = match outcome {
      CallOutcome::Succeeded { output, served_by } => {
        let cost = output.cost.unwrap_or(0.0);
        info!(
          intent_id = %settings.intent_id,
          step_id = %step_id,
          capability = %served_by.capability,
          action = %served_by.action,
          cost,
          "step_completed"
        );
        ctx.record(
          step_id,
          StepRecord {
            output: output.output.clone(),
            capability: Some(served_by.capability.clone()),
            action: Some(served_by.action.clone()),
            cost,
          },
        );
        return output.output;
      }
      CallOutcome::Failed { message } => {
        if call.required {
          ctx.fail_step(step_id);
        }
        message
      }
      CallOutcome::Cancelled => {
        // The interrupt is reported once for the intent, not per step.
        warn!(intent_id = %settings.intent_id, step_id = %step_id, "step_cancelled");
        let marker = cancelled_marker(step_id, call);
        ctx.record(
          step_id,
          StepRecord {
            output: marker.clone(),
            capability: Some(call.invocation.capability().to_string()),
            action: Some(call.invocation.action().to_string()),
            cost: 0.0,
          },
        );
        return marker;
      }
    };

    let message = redact(&failure);
    error!(
      intent_id = %settings.intent_id,
      step_id = %step_id,
      required = call.required,
      error = %message,
      "step_failed"
    );
    ctx.push_error(Some(step_id), message.clone());
    self.audit.publish(AuditEvent::StepFailed {
      intent_id: settings.intent_id.clone(),
      step_id: step_id.to_string(),
      message: message.clone(),
    });

    let marker = error_marker(step_id, &message);
    ctx.record(
      step_id,
      StepRecord {
        output: marker.clone(),
        capability: Some(call.invocation.capability().to_string()),
        action: Some(call.invocation.action().to_string()),
        cost: 0.0,
      },
    );
    marker
  }
}

/// Output recorded in place of a failed step's.
fn error_marker(step_id: &str, message: &str) -> Value {
  Value::map([
    ("error", Value::Bool(true)),
    ("step_id", Value::from(step_id)),
    ("message", Value::from(message)),
  ])
}

/// Output recorded for a step interrupted before it completed.
fn cancelled_marker(step_id: &str, call: &PreparedCall) -> Value {
  let message = format!(
    "cancelled: {}.{} did not complete",
    call.invocation.capability(),
    call.invocation.action()
  );
  Value::map([
    ("cancelled", Value::Bool(true)),
    ("step_id", Value::from(step_id)),
    ("message", Value::from(message)),
  ])
}

/// Assemble the invocation: parameters with placeholders resolved, then
/// `input` from `input_from`, then `input` from `input_template`.
fn prepare_call(settings: &RunSettings, planned: &PlannedInvocation, ctx: &ExecutionContext) -> PreparedCall {
  let mut parameters = resolve_parameters(&planned.parameters, ctx);

  if let Some(source) = &planned.input_from {
    let input = ctx
      .get(source)
      .map(|record| record.output.clone())
      .unwrap_or_else(|| Value::String(unresolved_marker(source)));
    parameters.insert("input".to_string(), input);
  }
  if let Some(template) = &planned.input_template {
    parameters.insert("input".to_string(), Value::String(resolve_template(template, ctx)));
  }

  let ceiling = settings.step_ceiling;
  let fallback = planned.fallback.as_ref().map(|target| {
    let timeout = planned
      .timeout_override
      .or_else(|| target.default_timeout())
      .unwrap_or(ceiling);
    (Arc::clone(target), timeout)
  });

  PreparedCall {
    invocation: Invocation {
      intent_id: settings.intent_id.clone(),
      step_id: planned.step_id.clone(),
      target: Arc::clone(&planned.target),
      parameters,
    },
    timeout: planned.timeout(ceiling),
    retry: planned.retry,
    fallback,
    required: planned.required,
  }
}

fn log_step_started(settings: &RunSettings, call: &PreparedCall) {
  info!(
    intent_id = %settings.intent_id,
    step_id = %call.step_id(),
    capability = %call.invocation.capability(),
    action = %call.invocation.action(),
    timeout_ms = call.timeout.as_millis() as u64,
    "step_started"
  );
}
