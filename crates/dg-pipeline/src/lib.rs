//! # dg-pipeline
//!
//! Composition and supervision of multi-stage media operations.
//!
//! This crate provides:
//!
//! - **[`Pipeline`] / [`PipelineStage`]** -- an ordered plan of tool
//!   invocations, run by the composer in [`executor`] with all-or-nothing
//!   cleanup of intermediates.
//! - **[`Operation`]** -- the registry of named operations (convert, resize,
//!   crop, ...) that plan pipelines from typed settings.
//! - **[`run_with_deadline`]** -- the timeout supervisor.
//! - **[`inspect_frames`]** -- GIF frame listing with thumbnails.
//! - **[`Orchestrator`]** -- the façade front-ends talk to.

pub mod context;
pub mod deadline;
pub mod executor;
pub mod inspect;
pub mod operations;
pub mod orchestrator;
pub mod settings;
pub mod stage;

#[cfg(all(test, unix))]
mod test_support;

// Re-export key types at the crate root.
pub use context::{PipelineContext, ProcessTracker, ProgressSender};
pub use deadline::run_with_deadline;
pub use executor::PipelineResult;
pub use inspect::{inspect_frames, FrameThumbnail};
pub use operations::Operation;
pub use orchestrator::{Orchestrator, RunOptions};
pub use settings::MediaKind;
pub use stage::{Pipeline, PipelineStage, StageInput, StagePaths};
