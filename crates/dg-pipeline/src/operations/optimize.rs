use dg_av::ToolKind;
use dg_core::{Error, Result};
use serde::Deserialize;

use crate::settings::MediaKind;
use crate::stage::{Pipeline, PipelineStage};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizeSettings {
    /// Lossy compression strength passed to `--lossy`.
    pub compression_level: u32,
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self {
            compression_level: 80,
        }
    }
}

pub(super) fn plan(settings: &OptimizeSettings, media: MediaKind) -> Result<Pipeline> {
    if media != MediaKind::Gif {
        return Err(Error::validation("Optimize only supports GIF files"));
    }
    let stage = PipelineStage::new(
        "optimize",
        ToolKind::GifTool,
        vec![
            "--optimize=3".into(),
            format!("--lossy={}", settings.compression_level),
            "--colors".into(),
            "256".into(),
        ],
    )
    .describe("Optimizing GIF");
    Ok(Pipeline::new("optimize").stage(stage))
}
