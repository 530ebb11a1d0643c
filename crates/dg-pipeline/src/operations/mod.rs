//! The Operation Registry.
//!
//! Each user-facing operation is a variant of [`Operation`]. Planning
//! resolves the operation's typed settings and returns the [`Pipeline`] of
//! stages that implements it for the given media kind. Dispatch is a single
//! exhaustive `match`, so adding a variant without a planner fails to
//! compile.

mod clip;
mod convert;
mod crop;
mod effects;
mod frames;
mod optimize;
mod resize;
mod rotate;
mod speed;

use std::fmt;
use std::str::FromStr;

use dg_core::config::DefaultsConfig;
use dg_core::{Error, Result};
use serde_json::Value;

use crate::settings::{resolve, MediaKind};
use crate::stage::Pipeline;

pub use clip::ClipSettings;
pub use convert::ConvertSettings;
pub use crop::CropSettings;
pub use effects::{ColorPreset, EffectsSettings, FilterPreset, FramePreset};
pub use frames::{FrameEdit, FrameEditSettings};
pub use optimize::OptimizeSettings;
pub use resize::ResizeSettings;
pub use rotate::RotateSettings;
pub use speed::SpeedSettings;

/// A named media operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Convert,
    Resize,
    Crop,
    Rotate,
    Optimize,
    Effects,
    Speed,
    Clip,
    Frames,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Convert,
        Operation::Resize,
        Operation::Crop,
        Operation::Rotate,
        Operation::Optimize,
        Operation::Effects,
        Operation::Speed,
        Operation::Clip,
        Operation::Frames,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Convert => "convert",
            Operation::Resize => "resize",
            Operation::Crop => "crop",
            Operation::Rotate => "rotate",
            Operation::Optimize => "optimize",
            Operation::Effects => "effects",
            Operation::Speed => "speed",
            Operation::Clip => "clip",
            Operation::Frames => "frames",
        }
    }

    /// Plan the stages for `media` with the caller's settings overlaid on
    /// `defaults`.
    pub fn plan(self, settings: &Value, defaults: &DefaultsConfig, media: MediaKind) -> Result<Pipeline> {
        match self {
            Operation::Convert => convert::plan(&resolve(defaults, settings)?),
            Operation::Resize => resize::plan(&resolve(defaults, settings)?, media),
            Operation::Crop => crop::plan(&resolve(defaults, settings)?, media),
            Operation::Rotate => rotate::plan(&resolve(defaults, settings)?, media),
            Operation::Optimize => optimize::plan(&resolve(defaults, settings)?, media),
            Operation::Effects => effects::plan(&resolve(defaults, settings)?, media),
            Operation::Speed => speed::plan(&resolve(defaults, settings)?, media),
            Operation::Clip => clip::plan(&resolve(defaults, settings)?, media),
            Operation::Frames => frames::plan(&resolve(defaults, settings)?, media),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| Error::not_found("operation", s))
    }
}

/// Owned argument list from string slices.
pub(crate) fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.into_iter().map(str::to_string).collect()
}

/// Format a number the way the tools expect: no trailing `.0`.
pub(crate) fn num(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};

    use crate::stage::{Pipeline, StagePaths};

    /// Arguments of stage `index` with placeholder intermediate paths
    /// `/tmp/s0`, `/tmp/s1`, ...
    pub fn stage_args(pipeline: &Pipeline, index: usize) -> Vec<String> {
        let outputs: Vec<PathBuf> = (0..pipeline.len())
            .map(|i| PathBuf::from(format!("/tmp/s{i}")))
            .collect();
        pipeline.stages()[index].build_args(&StagePaths {
            input: Path::new("/in"),
            output: &outputs[index],
            outputs: &outputs,
        })
    }
}
