//! Conductor Registry
//!
//! The capability registry maps `(capability, action)` pairs to invocation
//! templates. It is loaded once at process start, never mutated afterwards,
//! and shared behind an `Arc` by every intent run. A restart is required to
//! pick up registry changes.

mod error;
mod registry;
mod template;

pub use error::RegistryError;
pub use registry::{Capability, CapabilityRegistry};
pub use template::{ActionTemplate, Method, join_url};
