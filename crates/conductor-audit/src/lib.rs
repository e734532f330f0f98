//! Audit events for orchestrations.
//!
//! The engine publishes one event when an orchestration starts, one per
//! failed step and one when it completes. Publishing is fire-and-forget: a
//! sink never blocks the caller and a failed delivery never changes the
//! outcome of an intent.

mod event;
mod sink;

pub use event::{AUDIT_SOURCE, AuditEvent, AuditRecord};
pub use sink::{AuditSink, ChannelAuditSink, HttpAuditSink, NoopAuditSink};
