//! dg-core: shared errors, process ids, configuration, and input validation.
//!
//! This crate is the foundational dependency for all other dg-* crates. It
//! owns the unified [`Error`] type, the [`ProcessId`] token used to track
//! external tool invocations, the JSON [`config::Config`], and the pure
//! [`validate`] functions that every path, argument vector and settings bag
//! must pass before it reaches a process spawn.

pub mod config;
pub mod error;
pub mod ids;
pub mod validate;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, KillReason, Result};
pub use ids::ProcessId;
pub use validate::Verdict;
