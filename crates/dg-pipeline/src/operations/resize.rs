use dg_av::ToolKind;
use dg_core::{Error, Result};
use serde::Deserialize;

use crate::settings::MediaKind;
use crate::stage::{Pipeline, PipelineStage};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResizeSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Round to the nearest even number; h264 rejects odd dimensions.
fn even(n: u32) -> u32 {
    ((n as f64 / 2.0).round() as u32) * 2
}

pub(super) fn plan(settings: &ResizeSettings, media: MediaKind) -> Result<Pipeline> {
    let (w, h) = (settings.width, settings.height);
    if w == 0 || h == 0 {
        return Err(Error::validation("Width and height must be positive"));
    }

    let stage = match media {
        MediaKind::Gif => PipelineStage::new(
            "resize",
            ToolKind::GifTool,
            vec!["--resize".into(), format!("{w}x{h}"), "--optimize=3".into()],
        )
        .describe("Resizing GIF"),
        MediaKind::Video => PipelineStage::new(
            "resize",
            ToolKind::Transcoder,
            vec![
                "-vf".into(),
                format!("scale={}:{}", even(w), even(h)),
                "-c:a".into(),
                "copy".into(),
            ],
        )
        .describe("Resizing video"),
        MediaKind::Image => PipelineStage::new(
            "resize",
            ToolKind::RasterTool,
            vec!["-resize".into(), format!("{w}x{h}")],
        )
        .describe("Resizing image"),
    };
    Ok(Pipeline::new("resize").stage(stage))
}
