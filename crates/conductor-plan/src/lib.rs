//! Conductor Plan
//!
//! This crate provides the "locked" representation of an intent. A plan is
//! the validated, resolved form of an [`conductor_config::Intent`] that is
//! ready for execution.
//!
//! Key differences from the wire `Intent`:
//! - Every `(capability, action)` pair, fallbacks included, is resolved to an
//!   invocation template from the registry
//! - `input_template` strings are parsed into a placeholder AST
//! - The intent id is assigned and defaulted options are made explicit

mod plan;
mod retry;
mod step;

pub use plan::Plan;
pub use retry::RetryPolicy;
pub use step::{FallbackTarget, PlannedGroup, PlannedInvocation, PlannedStep};
