use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::event::{AuditEvent, AuditRecord};

/// Receives audit events.
///
/// `publish` is called inline by the engine, so implementations must return
/// immediately and must not fail.
pub trait AuditSink: Send + Sync {
  fn publish(&self, event: AuditEvent);
}

impl<S: AuditSink + ?Sized> AuditSink for Box<S> {
  fn publish(&self, event: AuditEvent) {
    (**self).publish(event)
  }
}

impl<S: AuditSink + ?Sized> AuditSink for std::sync::Arc<S> {
  fn publish(&self, event: AuditEvent) {
    (**self).publish(event)
  }
}

/// Discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
  fn publish(&self, _event: AuditEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
  sender: mpsc::UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
  pub fn new(sender: mpsc::UnboundedSender<AuditEvent>) -> Self {
    Self { sender }
  }
}

impl AuditSink for ChannelAuditSink {
  fn publish(&self, event: AuditEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// POSTs each record as JSON to an HTTP endpoint from a spawned task.
///
/// Delivery is at-most-once: failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct HttpAuditSink {
  client: reqwest::Client,
  url: String,
  deliveries: TaskTracker,
}

impl HttpAuditSink {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: url.into(),
      deliveries: TaskTracker::new(),
    }
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// Wait up to `timeout` for deliveries still in flight. Clones share
  /// their deliveries, so any clone can flush.
  pub async fn flush(&self, timeout: Duration) {
    self.deliveries.close();
    if tokio::time::timeout(timeout, self.deliveries.wait()).await.is_err() {
      warn!(
        pending = self.deliveries.len(),
        "audit flush timed out, pending events dropped"
      );
    }
    self.deliveries.reopen();
  }
}

impl AuditSink for HttpAuditSink {
  fn publish(&self, event: AuditEvent) {
    let record = AuditRecord::new(&event);

    let Ok(handle) = tokio::runtime::Handle::try_current() else {
      warn!(event_type = %record.event_type, "no async runtime, audit event dropped");
      return;
    };

    let request = self.client.post(&self.url).json(&record);
    self.deliveries.spawn_on(
      async move {
        match request.send().await.and_then(|r| r.error_for_status()) {
          Ok(_) => debug!(event_type = %record.event_type, "audit event delivered"),
          Err(e) => warn!(
            event_type = %record.event_type,
            error = %e,
            "audit event delivery failed"
          ),
        }
      },
      &handle,
    );
  }
}
