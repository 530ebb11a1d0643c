//! Frame inspection: per-frame timing plus a small PNG thumbnail of each
//! frame of a GIF.
//!
//! Thumbnails are extracted in one transcoder pass into a scratch directory
//! and matched to the probe's frames by position. A thumbnail that cannot be
//! read becomes an empty placeholder instead of failing the whole listing.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dg_av::{path_arg, probe_gif, ToolKind};
use dg_core::validate::{validate_argument_vector, validate_source_path};
use dg_core::{Error, ProcessId, Result};
use serde::Serialize;

use crate::context::PipelineContext;

/// Thumbnail width in pixels; height keeps the aspect ratio.
const THUMBNAIL_WIDTH: u32 = 150;

/// One frame of an inspected GIF.
#[derive(Debug, Clone, Serialize)]
pub struct FrameThumbnail {
    pub index: usize,
    pub delay_ms: u32,
    /// Base64 PNG; empty when the thumbnail could not be read.
    pub thumbnail: String,
}

impl FrameThumbnail {
    pub fn is_placeholder(&self) -> bool {
        self.thumbnail.is_empty()
    }
}

/// List every frame of `input` with its delay and thumbnail.
pub async fn inspect_frames(ctx: &PipelineContext, input: &Path) -> Result<Vec<FrameThumbnail>> {
    validate_source_path(input).into_result("Invalid input file path provided")?;

    let probe_id = ProcessId::generate("gifsicle_info");
    ctx.tracker.record(&probe_id);
    let info = probe_gif(&ctx.tools, &ctx.processes, input, probe_id).await?;
    if info.frames == 0 {
        return Err(Error::validation("No frames found in GIF"));
    }

    let mut scope = ctx.artifacts.scope();
    let dir = scope.allocate_dir()?;
    let pattern = dir.join("frame_%03d.png");

    let args = vec!["-vf".to_string(), format!("scale={THUMBNAIL_WIDTH}:-1")];
    validate_argument_vector(&args).into_result("Invalid thumbnail arguments")?;
    let mut command = ctx.tools.command(ToolKind::Transcoder)?;
    command.args(ToolKind::Transcoder.assemble(
        &args,
        path_arg(input)?,
        path_arg(&pattern)?,
        ctx.use_gpu,
    ));

    if let Some(reason) = ctx.tracker.halted() {
        return Err(Error::Killed {
            tool: ToolKind::Transcoder.binary_name().to_string(),
            reason,
        });
    }
    let extract_id = ProcessId::generate("ffmpeg_frames");
    ctx.tracker.record(&extract_id);
    tracing::info!(input = %input.display(), frames = info.frames, "Extracting frame thumbnails");
    ctx.processes
        .run(&command, extract_id, ctx.stderr.clone())
        .await?;

    // The transcoder numbers its output from 1.
    let frames = info
        .timings
        .iter()
        .enumerate()
        .map(|(position, timing)| {
            let file = dir.join(format!("frame_{:03}.png", position + 1));
            let thumbnail = match std::fs::read(&file) {
                Ok(bytes) => STANDARD.encode(bytes),
                Err(e) => {
                    tracing::warn!(frame = timing.index, path = %file.display(), "Missing frame thumbnail: {e}");
                    String::new()
                }
            };
            FrameThumbnail {
                index: timing.index,
                delay_ms: timing.delay_ms,
                thumbnail,
            }
        })
        .collect();

    scope.release_all();
    Ok(frames)
}
