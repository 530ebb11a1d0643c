//! Frame edit: drop frames, retime and relink a GIF in one GIF-tool pass.

use dg_av::ToolKind;
use dg_core::{Error, Result};
use serde::Deserialize;

use crate::settings::MediaKind;
use crate::stage::{Pipeline, PipelineStage};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameEdit {
    pub skip: bool,
    /// Per-frame delay in centiseconds; 0 keeps the original.
    pub delay: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameEditSettings {
    /// One entry per source frame, in order.
    pub frames: Vec<FrameEdit>,
    /// Global delay in centiseconds; overrides per-frame delays when positive.
    pub delay_time: u32,
    pub loop_count: i32,
    /// Dispose each frame before drawing the next.
    pub dont_stack: bool,
}

pub(super) fn plan(settings: &FrameEditSettings, media: MediaKind) -> Result<Pipeline> {
    if media != MediaKind::Gif {
        return Err(Error::validation("Frame editing only supports GIF files"));
    }
    if settings.frames.is_empty() {
        return Err(Error::validation("No frames to process"));
    }

    let kept: Vec<usize> = settings
        .frames
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.skip)
        .map(|(i, _)| i)
        .collect();
    if kept.is_empty() {
        return Err(Error::validation("At least one frame must be kept"));
    }

    let mut args: Vec<String> = kept.iter().map(|i| format!("#{i}")).collect();
    if settings.delay_time > 0 {
        args.push(format!("--delay={}", settings.delay_time));
    } else {
        for (position, &index) in kept.iter().enumerate() {
            let delay = settings.frames[index].delay;
            if delay > 0 {
                args.push(format!("--delay={delay}"));
                args.push(format!("#{position}"));
            }
        }
    }
    args.push(format!("--loopcount={}", settings.loop_count));
    if settings.dont_stack {
        args.push("--disposal=previous".into());
    }
    args.push("--optimize=3".into());

    Ok(Pipeline::new("frames")
        .stage(PipelineStage::new("frames", ToolKind::GifTool, args).describe("Rebuilding GIF")))
}
