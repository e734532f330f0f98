use chrono::{DateTime, Utc};
use conductor_config::ExecutionShape;
use serde::{Deserialize, Serialize};

/// Value of `source` on every published record.
pub const AUDIT_SOURCE: &str = "orchestrator";

/// Lifecycle transitions worth auditing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditEvent {
  OrchestrationStarted {
    intent_id: String,
    source: Option<String>,
    shape: ExecutionShape,
    step_count: usize,
  },

  StepFailed {
    intent_id: String,
    step_id: String,
    message: String,
  },

  OrchestrationCompleted {
    intent_id: String,
    status: String,
    duration_ms: u64,
    total_cost: f64,
    error_count: usize,
  },
}

impl AuditEvent {
  pub fn event_type(&self) -> &'static str {
    match self {
      AuditEvent::OrchestrationStarted { .. } => "orchestration_started",
      AuditEvent::StepFailed { .. } => "step_failed",
      AuditEvent::OrchestrationCompleted { .. } => "orchestration_completed",
    }
  }

  pub fn intent_id(&self) -> &str {
    match self {
      AuditEvent::OrchestrationStarted { intent_id, .. }
      | AuditEvent::StepFailed { intent_id, .. }
      | AuditEvent::OrchestrationCompleted { intent_id, .. } => intent_id,
    }
  }

  /// The event payload, without the envelope.
  pub fn data(&self) -> serde_json::Value {
    match self {
      AuditEvent::OrchestrationStarted {
        intent_id,
        source,
        shape,
        step_count,
      } => serde_json::json!({
        "intent_id": intent_id,
        "source": source,
        "shape": shape,
        "step_count": step_count,
      }),
      AuditEvent::StepFailed {
        intent_id,
        step_id,
        message,
      } => serde_json::json!({
        "intent_id": intent_id,
        "step_id": step_id,
        "message": message,
      }),
      AuditEvent::OrchestrationCompleted {
        intent_id,
        status,
        duration_ms,
        total_cost,
        error_count,
      } => serde_json::json!({
        "intent_id": intent_id,
        "status": status,
        "duration_ms": duration_ms,
        "total_cost": total_cost,
        "error_count": error_count,
      }),
    }
  }
}

/// The envelope an event is published in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
  pub event_type: String,
  pub source: String,
  pub data: serde_json::Value,
  pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
  pub fn new(event: &AuditEvent) -> Self {
    Self {
      event_type: event.event_type().to_string(),
      source: AUDIT_SOURCE.to_string(),
      data: event.data(),
      timestamp: Utc::now(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_record_envelope() {
    let event = AuditEvent::OrchestrationCompleted {
      intent_id: "i-1".to_string(),
      status: "failed".to_string(),
      duration_ms: 120,
      total_cost: 1.5,
      error_count: 2,
    };
    let record = AuditRecord::new(&event);

    assert_eq!(record.event_type, "orchestration_completed");
    assert_eq!(record.source, "orchestrator");
    assert_eq!(
      record.data,
      json!({"intent_id": "i-1", "status": "failed", "duration_ms": 120, "total_cost": 1.5, "error_count": 2})
    );

    let wire = serde_json::to_value(&record).unwrap();
    assert!(wire["timestamp"].is_string());
  }

  #[test]
  fn test_started_data_uses_wire_shape_names() {
    let event = AuditEvent::OrchestrationStarted {
      intent_id: "i-2".to_string(),
      source: None,
      shape: ExecutionShape::Parallel,
      step_count: 3,
    };
    assert_eq!(event.data()["shape"], json!("parallel"));
    assert_eq!(event.data()["source"], json!(null));
    assert_eq!(event.intent_id(), "i-2");
  }
}
