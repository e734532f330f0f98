#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conductor_audit::{AuditEvent, ChannelAuditSink};
use conductor_client::{CapabilityClient, Invocation, InvocationError, InvocationOutput};
use conductor_config::{Intent, Value, ValueMap};
use conductor_engine::{EngineConfig, ExecutionEngine};
use conductor_registry::CapabilityRegistry;
use conductor_validator::RegistryValidator;
use serde_json::json;
use tokio::sync::mpsc;

/// How a scripted `(capability, action)` answers.
#[derive(Debug, Clone)]
pub enum Behavior {
  /// Reply with this output.
  Reply(serde_json::Value),
  /// Reply with this output and cost.
  Costly(serde_json::Value, f64),
  /// Reply with the parameters received.
  Echo,
  /// Connection refused.
  Unreachable,
  /// Transport failure with a custom message.
  TransportMessage(String),
  /// Non-success HTTP status.
  Status(u16),
  /// Never reply; only the timeout ends the call.
  Hang,
  /// Wait, then behave.
  Delay(Duration, Box<Behavior>),
  /// Be unreachable for the first `n` calls, then behave.
  FailTimes(usize, Box<Behavior>),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
  pub step_id: String,
  pub capability: String,
  pub action: String,
  pub parameters: ValueMap,
  pub timeout: Duration,
  pub started: Instant,
  pub finished: Option<Instant>,
}

/// In-process capability client following a script.
#[derive(Default)]
pub struct ScriptedClient {
  script: HashMap<(String, String), Behavior>,
  calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on(mut self, capability: &str, action: &str, behavior: Behavior) -> Self {
    self
      .script
      .insert((capability.to_string(), action.to_string()), behavior);
    self
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn calls_for(&self, step_id: &str) -> Vec<RecordedCall> {
    self
      .calls()
      .into_iter()
      .filter(|call| call.step_id == step_id)
      .collect()
  }

  fn previous_calls(&self, capability: &str, action: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|call| call.capability == capability && call.action == action)
      .count()
  }

  async fn play(
    &self,
    behavior: &Behavior,
    invocation: &Invocation,
    attempts: usize,
  ) -> Result<InvocationOutput, InvocationError> {
    let mut behavior = behavior.clone();
    loop {
      match behavior {
        Behavior::Reply(output) => return Ok(InvocationOutput::new(Value::from(output))),
        Behavior::Costly(output, cost) => {
          return Ok(InvocationOutput::new(Value::from(output)).with_cost(cost));
        }
        Behavior::Echo => {
          return Ok(InvocationOutput::new(Value::Map(invocation.parameters.clone())));
        }
        Behavior::Unreachable => {
          return Err(transport(invocation, "connection refused"));
        }
        Behavior::TransportMessage(message) => return Err(transport(invocation, &message)),
        Behavior::Status(status) => {
          return Err(InvocationError::Status {
            capability: invocation.capability().to_string(),
            action: invocation.action().to_string(),
            status,
            body: "scripted failure".to_string(),
          });
        }
        Behavior::Hang => return std::future::pending().await,
        Behavior::Delay(delay, next) => {
          tokio::time::sleep(delay).await;
          behavior = *next;
        }
        Behavior::FailTimes(n, next) => {
          if attempts < n {
            return Err(transport(invocation, "connection reset"));
          }
          behavior = *next;
        }
      }
    }
  }
}

fn transport(invocation: &Invocation, message: &str) -> InvocationError {
  InvocationError::Transport {
    capability: invocation.capability().to_string(),
    action: invocation.action().to_string(),
    message: message.to_string(),
  }
}

#[async_trait]
impl CapabilityClient for ScriptedClient {
  async fn invoke(
    &self,
    invocation: &Invocation,
    timeout: Duration,
  ) -> Result<InvocationOutput, InvocationError> {
    let capability = invocation.capability().to_string();
    let action = invocation.action().to_string();
    let attempts = self.previous_calls(&capability, &action);

    let index = {
      let mut calls = self.calls.lock().unwrap();
      calls.push(RecordedCall {
        step_id: invocation.step_id.clone(),
        capability: capability.clone(),
        action: action.clone(),
        parameters: invocation.parameters.clone(),
        timeout,
        started: Instant::now(),
        finished: None,
      });
      calls.len() - 1
    };

    let behavior = self
      .script
      .get(&(capability.clone(), action.clone()))
      .cloned()
      .unwrap_or(Behavior::Unreachable);

    let result = match tokio::time::timeout(timeout, self.play(&behavior, invocation, attempts)).await {
      Ok(result) => result,
      Err(_) => Err(InvocationError::Timeout {
        capability,
        action,
        timeout_ms: timeout.as_millis() as u64,
      }),
    };

    self.calls.lock().unwrap()[index].finished = Some(Instant::now());
    result
  }
}

pub fn registry() -> Arc<CapabilityRegistry> {
  let registry = CapabilityRegistry::from_json_str(
    &json!({
      "version": "test",
      "capabilities": {
        "echo": {
          "base_url": "http://localhost:8001",
          "actions": {
            "ping": {"endpoint": "/ping", "parameters": ["msg", "input"]},
            "shout": {"endpoint": "/shout"}
          }
        },
        "echo2": {
          "base_url": "http://localhost:8002",
          "actions": {
            "ping": {"endpoint": "/ping"},
            "pong": {"endpoint": "/pong"}
          }
        },
        "ledger": {
          "base_url": "http://localhost:8003",
          "actions": {
            "record": {"endpoint": "/record"},
            "lookup": {"endpoint": "/lookup", "method": "GET"}
          }
        },
        "slow": {
          "base_url": "http://localhost:8004",
          "actions": {
            "wait": {"endpoint": "/wait", "timeout_ms": 50}
          }
        },
        "down": {
          "base_url": "http://localhost:8005",
          "actions": {
            "ping": {"endpoint": "/ping"}
          }
        }
      }
    })
    .to_string(),
  )
  .unwrap();
  Arc::new(registry)
}

pub fn intent(value: serde_json::Value) -> Intent {
  serde_json::from_value(value).unwrap()
}

pub type TestEngine = ExecutionEngine<ScriptedClient, ChannelAuditSink>;

/// Engine over a scripted client, with audit events captured.
pub fn engine(
  client: ScriptedClient,
  config: EngineConfig,
) -> (TestEngine, Arc<ScriptedClient>, mpsc::UnboundedReceiver<AuditEvent>) {
  let client = Arc::new(client);
  let (tx, rx) = mpsc::unbounded_channel();
  let engine = ExecutionEngine::with_audit(
    Arc::new(RegistryValidator::new(registry())),
    Arc::clone(&client),
    config,
    ChannelAuditSink::new(tx),
  );
  (engine, client, rx)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<AuditEvent>) -> Vec<AuditEvent> {
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  events
}
