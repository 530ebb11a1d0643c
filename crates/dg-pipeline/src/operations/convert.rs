//! Video to GIF through a generated palette.

use dg_av::ToolKind;
use dg_core::Result;
use serde::Deserialize;

use super::strings;
use crate::stage::{Pipeline, PipelineStage, StageInput};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertSettings {
    pub fps: u32,
    pub width: u32,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self { fps: 15, width: 800 }
    }
}

pub(super) fn plan(settings: &ConvertSettings) -> Result<Pipeline> {
    let scale = format!("fps={},scale={}:-1:flags=lanczos", settings.fps, settings.width);

    let palette = PipelineStage::new(
        "palette",
        ToolKind::Transcoder,
        vec![
            "-y".into(),
            "-vf".into(),
            format!("{scale},palettegen"),
            "-f".into(),
            "image2".into(),
        ],
    )
    .describe("Generating color palette")
    .output_ext("png");

    let graph = format!("[0:v]{scale}[x];[x][1:v]paletteuse=dither=bayer:bayer_scale=5");
    let gif = PipelineStage::with_args("gif", ToolKind::Transcoder, move |p| {
        let mut args = vec!["-i".to_string(), p.output_of(0), "-filter_complex".into(), graph.clone()];
        args.extend(strings(["-y", "-f", "gif"]));
        args
    })
    .describe("Creating GIF")
    .input(StageInput::Source);

    Ok(Pipeline::new("convert").stage(palette).stage(gif))
}
