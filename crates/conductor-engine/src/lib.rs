//! Conductor Execution Engine
//!
//! This crate executes validated intents against capabilities and folds each
//! run into a single `Response`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       IntentRunner                          │
//! │  - owns mpsc channel of submissions                         │
//! │  - submitter().submit(intent) awaits the response           │
//! │  - start(cancel) runs the execution loop                    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ExecutionEngine                         │
//! │  - execute(intent, cancel) → Response                       │
//! │  - validation into a Plan, shapes, groups, deadline         │
//! │  - retry / fallback policy, audit events                    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CapabilityClient                        │
//! │  - one invocation, one timeout                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use conductor_engine::{EngineConfig, ExecutionEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = Arc::new(CapabilityRegistry::load("registry.json").await?);
//! let client = Arc::new(HttpCapabilityClient::new());
//! let engine = ExecutionEngine::from_registry(registry, client, EngineConfig::default());
//!
//! let response = engine.execute(&intent, CancellationToken::new()).await?;
//! ```

mod config;
mod context;
mod engine;
mod error;
mod invoke;
mod redact;
mod response;
mod runner;

pub use config::EngineConfig;
pub use context::{ErrorEntry, ExecutionContext, StepRecord};
pub use engine::ExecutionEngine;
pub use error::EngineError;
pub use redact::{REDACTED, redact};
pub use response::{IntentStatus, Response, aggregate};
pub use runner::{IntentRunner, IntentSubmitter, Submission};
