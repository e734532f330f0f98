//! Intent runner with channel-based submission.
//!
//! The `IntentRunner` owns an mpsc channel of submitted intents and executes
//! them one at a time on an `ExecutionEngine`, replying to each submitter.

use std::sync::Arc;

use conductor_audit::AuditSink;
use conductor_client::CapabilityClient;
use conductor_config::Intent;
use conductor_validator::ValidationError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::engine::ExecutionEngine;
use crate::error::EngineError;
use crate::response::Response;

/// An intent waiting for execution, and where to send its outcome.
pub struct Submission {
  pub intent: Intent,
  pub reply: oneshot::Sender<Result<Response, ValidationError>>,
}

/// Cloneable handle for submitting intents to a running [`IntentRunner`].
#[derive(Clone)]
pub struct IntentSubmitter {
  sender: mpsc::Sender<Submission>,
}

impl IntentSubmitter {
  /// Submit an intent and wait for its response.
  pub async fn submit(&self, intent: Intent) -> Result<Response, EngineError> {
    let (reply, receiver) = oneshot::channel();
    self
      .sender
      .send(Submission { intent, reply })
      .await
      .map_err(|_| EngineError::RunnerClosed)?;

    let result = receiver.await.map_err(|_| EngineError::ReplyDropped)?;
    Ok(result?)
  }

  pub fn is_closed(&self) -> bool {
    self.sender.is_closed()
  }
}

/// Executes submitted intents in arrival order.
///
/// # Usage
///
/// ```ignore
/// let runner = IntentRunner::new(engine);
///
/// // Hand out submitters to whatever produces intents
/// let submitter = runner.submitter();
///
/// // Start the execution loop
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await;
/// ```
pub struct IntentRunner<C, A>
where
  C: CapabilityClient + 'static,
  A: AuditSink,
{
  sender: mpsc::Sender<Submission>,
  receiver: mpsc::Receiver<Submission>,
  engine: Arc<ExecutionEngine<C, A>>,
}

impl<C, A> IntentRunner<C, A>
where
  C: CapabilityClient + 'static,
  A: AuditSink,
{
  pub fn new(engine: Arc<ExecutionEngine<C, A>>) -> Self {
    Self::with_buffer_size(engine, 100)
  }

  pub fn with_buffer_size(engine: Arc<ExecutionEngine<C, A>>, buffer_size: usize) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      engine,
    }
  }

  pub fn submitter(&self) -> IntentSubmitter {
    IntentSubmitter {
      sender: self.sender.clone(),
    }
  }

  /// Start the execution loop.
  ///
  /// Runs until the cancellation token is triggered or every submitter is
  /// dropped. Each execution gets a child token, so cancelling the runner
  /// also interrupts the intent in flight.
  pub async fn start(mut self, cancel: CancellationToken) {
    // Only submitters keep the channel open from here on.
    drop(self.sender);
    info!("starting intent runner");

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("intent runner cancelled");
          break;
        }
        submission = self.receiver.recv() => {
          let Some(Submission { intent, reply }) = submission else {
            info!("intent runner channel closed");
            break;
          };

          let result = self.engine.execute(&intent, cancel.child_token()).await;
          match &result {
            Ok(response) => info!(
              intent_id = %response.intent_id,
              status = %response.status,
              "intent execution finished"
            ),
            Err(e) => error!(error = %e, "intent rejected"),
          }

          // Submitter may have given up waiting
          let _ = reply.send(result);
        }
      }
    }
  }

  pub fn engine(&self) -> &ExecutionEngine<C, A> {
    &self.engine
  }
}
