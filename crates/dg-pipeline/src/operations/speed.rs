use dg_av::ToolKind;
use dg_core::{Error, Result};
use serde::Deserialize;

use super::{num, strings};
use crate::settings::MediaKind;
use crate::stage::{Pipeline, PipelineStage, StageInput};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeedSettings {
    /// Playback speed factor; 2 plays twice as fast.
    pub speed_multiplier: f64,
    /// Keep every Nth frame.
    pub skip_frames: u32,
}

impl Default for SpeedSettings {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            skip_frames: 1,
        }
    }
}

fn filter_chain(s: &SpeedSettings) -> Result<String> {
    if s.speed_multiplier <= 0.0 {
        return Err(Error::validation("Speed multiplier must be positive"));
    }
    let mut filters = Vec::new();
    if s.skip_frames > 1 {
        filters.push(format!("select='not(mod(n,{}))'", s.skip_frames));
    }
    if s.speed_multiplier != 1.0 {
        filters.push(format!("setpts=PTS/{}", num(s.speed_multiplier)));
    }
    if filters.is_empty() {
        return Err(Error::validation("No speed changes to apply"));
    }
    Ok(filters.join(","))
}

pub(super) fn plan(settings: &SpeedSettings, media: MediaKind) -> Result<Pipeline> {
    let filters = filter_chain(settings)?;
    let pipeline = Pipeline::new("speed");

    if media != MediaKind::Gif {
        let mut args = Vec::new();
        if settings.skip_frames > 1 {
            args.extend(strings(["-vsync", "vfr"]));
        }
        args.extend(["-vf".into(), filters, "-c:a".into(), "copy".into()]);
        return Ok(pipeline.stage(
            PipelineStage::new("speed", ToolKind::Transcoder, args).describe("Processing video"),
        ));
    }

    // GIF: re-time as h264, build a palette from the result, remap to GIF.
    let retime = PipelineStage::new(
        "retime",
        ToolKind::Transcoder,
        vec![
            "-vf".into(),
            format!("{filters},scale='trunc(iw/2)*2:trunc(ih/2)*2'"),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ],
    )
    .describe("Processing GIF frames")
    .output_ext("mp4");

    let palette = PipelineStage::new(
        "palette",
        ToolKind::Transcoder,
        strings(["-vf", "palettegen=stats_mode=diff"]),
    )
    .describe("Generating optimized color palette")
    .output_ext("png");

    let remap = PipelineStage::with_args("gif", ToolKind::Transcoder, |p| {
        vec![
            "-i".into(),
            p.output_of(1),
            "-filter_complex".into(),
            "[0:v][1:v]paletteuse=dither=bayer:bayer_scale=5".into(),
        ]
    })
    .describe("Converting back to GIF")
    .input(StageInput::Stage(0));

    Ok(pipeline.stage(retime).stage(palette).stage(remap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::stage_args;

    #[test]
    fn no_change_is_rejected() {
        let err = plan(&SpeedSettings::default(), MediaKind::Video).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn video_with_frame_skip_uses_variable_rate() {
        let s = SpeedSettings {
            speed_multiplier: 2.0,
            skip_frames: 3,
        };
        let p = plan(&s, MediaKind::Video).unwrap();
        assert_eq!(
            stage_args(&p, 0),
            strings([
                "-vsync",
                "vfr",
                "-vf",
                "select='not(mod(n,3))',setpts=PTS/2",
                "-c:a",
                "copy",
            ])
        );
    }

    #[test]
    fn gif_runs_three_stages_through_video_and_palette() {
        let s = SpeedSettings {
            speed_multiplier: 0.5,
            skip_frames: 1,
        };
        let p = plan(&s, MediaKind::Gif).unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.stages()[0].output_ext, "mp4");
        assert_eq!(p.stages()[1].output_ext, "png");
        assert_eq!(p.stages()[2].input, StageInput::Stage(0));
        assert_eq!(
            stage_args(&p, 0)[1],
            "setpts=PTS/0.5,scale='trunc(iw/2)*2:trunc(ih/2)*2'"
        );
        assert_eq!(stage_args(&p, 2)[1], "/tmp/s1");
    }

    #[test]
    fn non_positive_multiplier_is_rejected() {
        let s = SpeedSettings {
            speed_multiplier: 0.0,
            skip_frames: 2,
        };
        assert!(plan(&s, MediaKind::Video).is_err());
    }
}
