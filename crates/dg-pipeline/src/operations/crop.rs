use dg_av::ToolKind;
use dg_core::{Error, Result};
use serde::Deserialize;

use super::strings;
use crate::settings::MediaKind;
use crate::stage::{Pipeline, PipelineStage};

/// Crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CropSettings {
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_width: u32,
    pub crop_height: u32,
}

pub(super) fn plan(settings: &CropSettings, media: MediaKind) -> Result<Pipeline> {
    let CropSettings {
        crop_x: x,
        crop_y: y,
        crop_width: w,
        crop_height: h,
    } = *settings;
    if w < 1 || h < 1 {
        return Err(Error::validation("Crop area must be at least 1x1 pixels"));
    }

    let stage = match media {
        MediaKind::Gif => PipelineStage::new(
            "crop",
            ToolKind::GifTool,
            vec![
                "--crop".into(),
                format!("{x},{y}-{},{}", x + w, y + h),
                "--optimize=3".into(),
            ],
        )
        .describe("Cropping GIF"),
        MediaKind::Video => {
            let mut args = strings(["-map", "0:v:0", "-map", "0:a?", "-vf"]);
            args.push(format!("crop={w}:{h}:{x}:{y}"));
            args.extend(strings([
                "-c:v", "libx264", "-preset", "veryfast", "-crf", "18", "-c:a", "copy",
            ]));
            PipelineStage::new("crop", ToolKind::Transcoder, args).describe("Cropping video")
        }
        MediaKind::Image => PipelineStage::new(
            "crop",
            ToolKind::RasterTool,
            vec!["-crop".into(), format!("{w}x{h}+{x}+{y}"), "+repage".into()],
        )
        .describe("Cropping image"),
    };
    Ok(Pipeline::new("crop").stage(stage))
}
