use dg_av::ToolKind;
use dg_core::Result;
use serde::Deserialize;

use super::num;
use crate::settings::MediaKind;
use crate::stage::{Pipeline, PipelineStage};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotateSettings {
    /// Clockwise rotation in degrees.
    #[serde(alias = "liveRotation")]
    pub angle: f64,
}

/// Transcoder filter for a rotation. Quarter turns use lossless transposes.
fn video_filter(angle: f64) -> String {
    if angle == 90.0 || angle == -270.0 {
        "transpose=1".into()
    } else if angle == -90.0 || angle == 270.0 {
        "transpose=2".into()
    } else if angle == 180.0 || angle == -180.0 {
        "transpose=1,transpose=1".into()
    } else {
        format!("rotate={}:c=white", num(angle.to_radians()))
    }
}

pub(super) fn plan(settings: &RotateSettings, media: MediaKind) -> Result<Pipeline> {
    let angle = num(settings.angle);
    let stage = match media {
        MediaKind::Gif => PipelineStage::new(
            "rotate",
            ToolKind::RasterTool,
            vec![
                "-coalesce".into(),
                "-rotate".into(),
                angle,
                "-layers".into(),
                "Optimize".into(),
            ],
        )
        .describe("Rotating GIF frames"),
        MediaKind::Video => PipelineStage::new(
            "rotate",
            ToolKind::Transcoder,
            vec![
                "-vf".into(),
                video_filter(settings.angle),
                "-c:a".into(),
                "copy".into(),
            ],
        )
        .describe("Rotating video"),
        MediaKind::Image => PipelineStage::new(
            "rotate",
            ToolKind::RasterTool,
            vec![
                "-rotate".into(),
                angle,
                "-background".into(),
                "white".into(),
                "-flatten".into(),
            ],
        )
        .describe("Rotating image"),
    };
    Ok(Pipeline::new("rotate").stage(stage))
}
