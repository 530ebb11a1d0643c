use dg_av::ToolKind;
use dg_core::{Error, Result};
use serde::Deserialize;

use super::strings;
use crate::settings::MediaKind;
use crate::stage::{Pipeline, PipelineStage};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClipSettings {
    /// First kept frame (GIF).
    pub clip_start_frame: u64,
    /// Last kept frame, inclusive (GIF).
    pub clip_end_frame: u64,
    /// Frame count from a prior probe; clamps `clip_end_frame` when set.
    pub detected_frame_count: Option<u64>,
    /// `HH:MM:SS` (video).
    pub clip_start_time: String,
    pub clip_end_time: String,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            clip_start_frame: 0,
            clip_end_frame: 0,
            detected_frame_count: None,
            clip_start_time: "00:00:00".into(),
            clip_end_time: "00:00:00".into(),
        }
    }
}

/// Seconds in an `HH:MM:SS` timestamp. Seconds may be fractional.
fn parse_timestamp(stamp: &str) -> Result<f64> {
    let invalid = || Error::validation(format!("Invalid timestamp {stamp:?}, expected HH:MM:SS"));
    let parts: Vec<&str> = stamp.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(invalid());
    };
    let h: u64 = h.parse().map_err(|_| invalid())?;
    let m: u64 = m.parse().map_err(|_| invalid())?;
    let s: f64 = s.parse().map_err(|_| invalid())?;
    if !s.is_finite() || s < 0.0 {
        return Err(invalid());
    }
    Ok((h * 3600 + m * 60) as f64 + s)
}

fn gif_stage(s: &ClipSettings) -> Result<PipelineStage> {
    let start = s.clip_start_frame;
    let mut end = s.clip_end_frame.max(start);
    if let Some(count) = s.detected_frame_count.filter(|&c| c > 0) {
        end = end.min(count - 1);
    }
    if end < start {
        return Err(Error::validation("End frame must be after start frame"));
    }

    let graph = format!(
        "[0:v]select=between(n\\,{start}\\,{end}),setpts=PTS-STARTPTS,\
         split[sel][palin];[palin]palettegen=stats_mode=single[pal];\
         [sel][pal]paletteuse=dither=floyd_steinberg"
    );
    let mut args = strings(["-v", "error", "-filter_complex"]);
    args.push(graph);
    args.extend(strings(["-gifflags", "+transdiff"]));

    Ok(PipelineStage::new("clip", ToolKind::Transcoder, args)
        .describe("Clipping GIF frames")
        .gpu(false))
}

fn video_stage(s: &ClipSettings) -> Result<PipelineStage> {
    let start = parse_timestamp(&s.clip_start_time)?;
    let end = parse_timestamp(&s.clip_end_time)?;
    let duration = end - start;
    if duration <= 0.0 {
        return Err(Error::validation("End time must be after start time"));
    }
    Ok(PipelineStage::new(
        "clip",
        ToolKind::Transcoder,
        vec![
            "-ss".into(),
            s.clip_start_time.trim().to_string(),
            "-t".into(),
            super::num(duration),
            "-c".into(),
            "copy".into(),
        ],
    )
    .describe("Clipping video"))
}

pub(super) fn plan(settings: &ClipSettings, media: MediaKind) -> Result<Pipeline> {
    let stage = match media {
        MediaKind::Gif => gif_stage(settings)?,
        MediaKind::Video => video_stage(settings)?,
        MediaKind::Image => return Err(Error::validation("Clip needs a GIF or video source")),
    };
    Ok(Pipeline::new("clip").stage(stage))
}
