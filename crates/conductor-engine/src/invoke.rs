//! Per-step failure policy: retries, then fallback.
//!
//! Two tokens stop a step early. `cancel` interrupts it outright, even
//! mid-request. `abandon` lets the request on the wire finish but skips any
//! retry or fallback still to come.

use std::sync::Arc;
use std::time::Duration;

use conductor_client::{CapabilityClient, Invocation, InvocationError, InvocationOutput};
use conductor_plan::{FallbackTarget, RetryPolicy};
use conductor_registry::ActionTemplate;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// An invocation with everything the policy needs, detached from the context
/// so it can move into a spawned task.
#[derive(Debug, Clone)]
pub(crate) struct PreparedCall {
  pub invocation: Invocation,
  pub timeout: Duration,
  pub retry: RetryPolicy,
  pub fallback: Option<(FallbackTarget, Duration)>,
  pub required: bool,
}

impl PreparedCall {
  pub fn step_id(&self) -> &str {
    &self.invocation.step_id
  }
}

#[derive(Debug)]
pub(crate) enum CallOutcome {
  Succeeded {
    output: InvocationOutput,
    served_by: Arc<ActionTemplate>,
  },
  Failed {
    message: String,
  },
  Cancelled,
}

impl CallOutcome {
  pub fn is_failed(&self) -> bool {
    matches!(self, CallOutcome::Failed { .. })
  }
}

/// Run one step's invocation under its failure policy.
pub(crate) async fn perform<C>(
  client: &C,
  call: &PreparedCall,
  cancel: &CancellationToken,
  abandon: &CancellationToken,
) -> CallOutcome
where
  C: CapabilityClient + ?Sized,
{
  tokio::select! {
    biased;
    _ = cancel.cancelled() => CallOutcome::Cancelled,
    outcome = attempt(client, call, abandon) => outcome,
  }
}

async fn attempt<C>(client: &C, call: &PreparedCall, abandon: &CancellationToken) -> CallOutcome
where
  C: CapabilityClient + ?Sized,
{
  let primary = match invoke_with_retries(client, call, abandon).await {
    Ok(output) => {
      return CallOutcome::Succeeded {
        output,
        served_by: Arc::clone(&call.invocation.target),
      };
    }
    Err(e) => e,
  };

  let Some((fallback, timeout)) = call.fallback.as_ref().filter(|_| primary.triggers_fallback()) else {
    return CallOutcome::Failed {
      message: primary.to_string(),
    };
  };
  if abandon.is_cancelled() {
    info!(step_id = %call.step_id(), "fallback skipped, step abandoned");
    return CallOutcome::Failed {
      message: primary.to_string(),
    };
  }

  info!(
    step_id = %call.step_id(),
    capability = %call.invocation.capability(),
    fallback_capability = %fallback.capability,
    fallback_action = %fallback.action,
    error = %primary,
    "fallback_invoked"
  );

  let redirected = call.invocation.redirect(Arc::clone(fallback));
  match client.invoke(&redirected, *timeout).await {
    Ok(output) => CallOutcome::Succeeded {
      output,
      served_by: Arc::clone(fallback),
    },
    Err(e) => CallOutcome::Failed {
      message: format!("{}; fallback failed: {}", primary, e),
    },
  }
}

async fn invoke_with_retries<C>(
  client: &C,
  call: &PreparedCall,
  abandon: &CancellationToken,
) -> Result<InvocationOutput, InvocationError>
where
  C: CapabilityClient + ?Sized,
{
  let invocation = &call.invocation;
  let retry = &call.retry;
  let mut attempt = 0;
  loop {
    match client.invoke(invocation, call.timeout).await {
      Ok(output) => return Ok(output),
      Err(e) if e.triggers_fallback() && attempt < retry.retries && !abandon.is_cancelled() => {
        attempt += 1;
        let delay = retry.delay(attempt);
        warn!(
          step_id = %invocation.step_id,
          attempt,
          delay_ms = delay.as_millis() as u64,
          error = %e,
          "retrying invocation"
        );
        if !delay.is_zero() {
          tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = abandon.cancelled() => {
              info!(step_id = %invocation.step_id, attempt, "retry skipped, step abandoned");
              return Err(e);
            }
          }
        }
      }
      Err(e) => return Err(e),
    }
  }
}
