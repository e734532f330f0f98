//! Conductor Template
//!
//! Steps reference earlier outputs through `{{step_id.path.to.field}}`
//! placeholders. This crate parses those strings into a small AST, resolves
//! them against the outputs recorded so far, and evaluates step conditions
//! using the same path rules.
//!
//! Resolution is best-effort: a path that does not resolve is replaced by an
//! `<unresolved:...>` marker instead of failing, so the malformed parameter
//! is visible in the captured invocation.
//!
//! # Path semantics
//!
//! The first segment names a step. The remaining segments walk that step's
//! record `{output, capability, action, cost}`; a bare `{{s1}}` yields the
//! output itself. Numeric segments index into lists.
//!
//! ```text
//! {{fetch.output.items.0.name}}   -> output["items"][0]["name"] of step "fetch"
//! {{fetch.cost}}                  -> cost recorded for step "fetch"
//! {{fetch}}                       -> output of step "fetch"
//! ```

mod condition;
mod parser;
mod resolve;

pub use condition::evaluate;
pub use parser::{Part, PathExpr, Placeholder, Segment, Template};
pub use resolve::{
  OutputLookup, UNRESOLVED_PREFIX, canonical_text, resolve_parameters, resolve_path,
  resolve_template, resolve_value, unresolved_marker,
};
