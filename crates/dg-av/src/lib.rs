//! # dg-av
//!
//! External tool management for the deskgif pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg, ImageMagick and
//!   gifsicle, and assemble each tool's argv ([`ToolKind::assemble`]).
//! - **Process tracking** ([`ProcessRegistry`]) -- spawn tool invocations
//!   under a [`dg_core::ProcessId`], stream their stderr, and cancel them
//!   with a recorded reason.
//! - **Scratch files** ([`ArtifactManager`], [`ArtifactScope`]) --
//!   collision-free temp paths with scoped release, a stale-file sweep, and
//!   finalization onto the destination.
//! - **Probing** ([`probe_gif`], [`file_info`]) -- per-frame GIF timing and
//!   basic file metadata.

pub mod artifacts;
pub mod command;
pub mod probe;
pub mod process;
pub mod tools;

// ---- Re-exports for convenience ----

pub use artifacts::{finalize, ArtifactManager, ArtifactScope};
pub use command::{path_arg, ToolCommand, ToolOutput};
pub use probe::{file_info, probe_gif, FileInfo, FrameTiming, GifInfo};
pub use process::{ProcessRegistry, ProcessState, RunningProcess, StderrSink};
pub use tools::{ToolInfo, ToolKind, ToolRegistry};
