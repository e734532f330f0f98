//! Conductor Client
//!
//! One invocation of one capability action, bounded by one timeout. The
//! client never retries; retry and fallback are policy decisions made by the
//! engine, which uses [`InvocationError::triggers_fallback`] to tell
//! transient failures from terminal ones.

mod client;
mod error;
mod http;
mod invocation;

pub use client::CapabilityClient;
pub use error::InvocationError;
pub use http::{HealthStatus, HttpCapabilityClient};
pub use invocation::{Invocation, InvocationOutput};
