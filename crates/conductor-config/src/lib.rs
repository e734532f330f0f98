//! Conductor Config
//!
//! This crate contains the serializable wire types for conductor. These types
//! describe an intent as a caller submits it, and the capability registry as
//! it is stored on disk, before either is validated or loaded by the engine.
//!
//! Intents arrive from:
//! - JSON files (via CLI with `conductor run intent.json`)
//! - Newline-delimited JSON on stdin (`conductor batch`)
//!
//! Field names and shapes are part of the external contract and round-trip
//! losslessly so an intent can be replayed from the audit trail.

mod condition;
mod enums;
mod intent;
mod registry;
mod step;
mod value;

pub use condition::{Condition, Operator};
pub use enums::{ExecutionShape, RetryBackoff};
pub use intent::{Intent, IntentOptions};
pub use registry::{ActionDef, CapabilityDef, RegistryDef};
pub use step::{ActionStepDef, ParallelGroupDef, StepDef, StepOptions};
pub use value::Value;

/// Ordered map used for parameter maps and structured values.
pub type ValueMap = indexmap::IndexMap<String, Value>;
