//! Colour, geometry and animation effects.
//!
//! Video sources get a single transcoder filter chain. Images and GIFs get an
//! optional raster stage, and GIFs additionally an optional GIF-tool stage
//! for loop count, reversal and frame skipping.

use dg_av::ToolKind;
use dg_core::{Error, Result};
use serde::Deserialize;

use super::{num, strings};
use crate::settings::MediaKind;
use crate::stage::{Pipeline, PipelineStage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreset {
    #[default]
    #[serde(alias = "")]
    None,
    Grayscale,
    Sepia,
    Monochrome,
    Negative,
    Tint,
    Background,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    #[default]
    #[serde(alias = "")]
    None,
    Gotham,
    Lomo,
    Nashville,
    Toaster,
    Vignette,
    Polaroid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePreset {
    #[default]
    #[serde(alias = "")]
    None,
    Solid,
    Rounded,
    Camera,
    Fuzzy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectsSettings {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub color_preset: ColorPreset,
    pub tint_color: String,
    pub background_color: String,
    pub flip_vertical: bool,
    pub flip_horizontal: bool,
    pub rotation_degrees: f64,
    pub replace_color_enabled: bool,
    /// `"custom"` selects `replace_color_custom`; anything else is a colour name.
    pub replace_color_target: String,
    pub replace_color_custom: String,
    pub fuzz: f64,
    pub gaussian_blur: f64,
    pub sharpen: f64,
    pub filter: FilterPreset,
    pub frame: FramePreset,
    pub border_width: u32,
    pub border_color: String,
    pub corner_radius: u32,
    /// Negative leaves the loop count untouched.
    pub loop_count: i32,
    pub reverse: bool,
    pub skip_frames: u32,
}

impl Default for EffectsSettings {
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: 100.0,
            lightness: 100.0,
            brightness: 100.0,
            contrast: 100.0,
            color_preset: ColorPreset::None,
            tint_color: "#ff0000".into(),
            background_color: "#ffffff".into(),
            flip_vertical: false,
            flip_horizontal: false,
            rotation_degrees: 0.0,
            replace_color_enabled: false,
            replace_color_target: "white".into(),
            replace_color_custom: "#ffffff".into(),
            fuzz: 10.0,
            gaussian_blur: 0.0,
            sharpen: 0.0,
            filter: FilterPreset::None,
            frame: FramePreset::None,
            border_width: 10,
            border_color: "#000000".into(),
            corner_radius: 20,
            loop_count: -1,
            reverse: false,
            skip_frames: 1,
        }
    }
}

impl EffectsSettings {
    fn modulated(&self) -> bool {
        self.hue != 0.0 || self.saturation != 100.0 || self.lightness != 100.0
    }

    fn brightness_contrast(&self) -> bool {
        self.brightness != 100.0 || self.contrast != 100.0
    }
}

/// Raster arguments for every selected effect, without GIF framing.
fn raster_args(s: &EffectsSettings) -> Vec<String> {
    let mut args = Vec::new();

    if s.modulated() {
        args.push("-modulate".into());
        args.push(format!("{},{},{}", num(s.lightness), num(s.saturation), num(s.hue)));
    }
    if s.brightness_contrast() {
        args.push("-brightness-contrast".into());
        args.push(format!("{}x{}", num(s.brightness - 100.0), num(s.contrast - 100.0)));
    }

    match s.color_preset {
        ColorPreset::None => {}
        ColorPreset::Grayscale => args.extend(strings(["-colorspace", "Gray"])),
        ColorPreset::Sepia => args.extend(strings(["-sepia-tone", "80%"])),
        ColorPreset::Monochrome => args.push("-monochrome".into()),
        ColorPreset::Negative => args.push("-negate".into()),
        ColorPreset::Tint => {
            args.extend(["-fill".into(), s.tint_color.clone(), "-tint".into(), "50".into()])
        }
        ColorPreset::Background => {
            args.extend(["-background".into(), s.background_color.clone(), "-flatten".into()])
        }
    }

    if s.flip_vertical {
        args.push("-flip".into());
    }
    if s.flip_horizontal {
        args.push("-flop".into());
    }
    if s.rotation_degrees != 0.0 {
        args.push("-rotate".into());
        args.push(num(s.rotation_degrees));
    }
    if s.replace_color_enabled {
        let target = if s.replace_color_target == "custom" {
            &s.replace_color_custom
        } else {
            &s.replace_color_target
        };
        args.extend([
            "-fuzz".into(),
            format!("{}%", num(s.fuzz)),
            "-transparent".into(),
            target.clone(),
        ]);
    }
    if s.gaussian_blur > 0.0 {
        args.push("-blur".into());
        args.push(format!("0x{}", num(s.gaussian_blur)));
    }
    if s.sharpen > 0.0 {
        args.push("-sharpen".into());
        args.push(format!("0x{}", num(s.sharpen)));
    }

    match s.filter {
        FilterPreset::None => {}
        FilterPreset::Gotham => {
            args.extend(strings(["-modulate", "120,10,100", "-fill", "#222b6d", "-colorize", "20"]))
        }
        FilterPreset::Lomo => {
            args.extend(strings(["-channel", "R", "-level", "33%", "-channel", "G", "-level", "33%"]))
        }
        FilterPreset::Nashville => {
            args.extend(strings(["-contrast", "-modulate", "100,150,100", "-auto-gamma"]))
        }
        FilterPreset::Toaster => {
            args.extend(strings(["-modulate", "150,80,100", "-gamma", "1.2", "-contrast"]))
        }
        FilterPreset::Vignette => args.extend(strings(["-background", "black", "-vignette", "0x20"])),
        FilterPreset::Polaroid => args.extend(strings([
            "-bordercolor", "white", "-border", "10", "-bordercolor", "grey60", "-border", "1",
        ])),
    }

    match s.frame {
        FramePreset::None => {}
        FramePreset::Solid => args.extend([
            "-bordercolor".into(),
            s.border_color.clone(),
            "-border".into(),
            s.border_width.to_string(),
        ]),
        FramePreset::Rounded => {
            let r = s.corner_radius;
            args.extend(strings(["(", "+clone", "-alpha", "extract", "-draw"]));
            args.push(format!("roundrectangle 0,0,%w,%h,{r},{r}"));
            args.extend(strings([")", "-compose", "CopyOpacity", "-composite"]));
        }
        FramePreset::Camera => args.extend(strings(["-frame", "10x10+3+3"])),
        FramePreset::Fuzzy => args.extend(strings([
            "-virtual-pixel", "edge", "-blur", "0x8", "-fuzz", "50%", "-trim",
        ])),
    }

    args
}

/// GIF-tool arguments for loop count, reversal and frame skipping.
fn animation_args(s: &EffectsSettings) -> Vec<String> {
    let mut args = Vec::new();
    if s.skip_frames > 1 {
        args.push("--unoptimize".into());
    }
    if s.loop_count >= 0 {
        args.push(format!("--loopcount={}", s.loop_count));
    }
    if s.reverse {
        args.push("#-1-0".into());
    }
    if s.skip_frames > 1 {
        args.push(format!("#0-:{}", s.skip_frames));
    }
    args
}

fn video_filters(s: &EffectsSettings) -> Vec<String> {
    let mut filters = Vec::new();
    if s.hue != 0.0 || s.saturation != 100.0 {
        filters.push(format!("hue=s={}", num(s.saturation / 100.0)));
    }
    if s.brightness_contrast() {
        filters.push(format!(
            "eq=brightness={}:contrast={}",
            num((s.brightness - 100.0) / 100.0),
            num(s.contrast / 100.0)
        ));
    }
    if s.flip_vertical {
        filters.push("vflip".into());
    }
    if s.flip_horizontal {
        filters.push("hflip".into());
    }
    filters
}

pub(super) fn plan(settings: &EffectsSettings, media: MediaKind) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new("effects");

    if media == MediaKind::Video {
        let filters = video_filters(settings);
        if filters.is_empty() {
            return Err(Error::validation("Selected effects are not supported for videos"));
        }
        let stage = PipelineStage::new(
            "effects",
            ToolKind::Transcoder,
            vec!["-vf".into(), filters.join(","), "-c:a".into(), "copy".into()],
        )
        .describe("Applying effects to video");
        return Ok(pipeline.stage(stage));
    }

    let is_gif = media == MediaKind::Gif;
    let effects = raster_args(settings);
    let animation = if is_gif {
        animation_args(settings)
    } else {
        Vec::new()
    };
    if effects.is_empty() && animation.is_empty() {
        return Err(Error::validation("No effects or animation changes selected"));
    }

    if !effects.is_empty() {
        let args = if is_gif {
            let mut wrapped = vec!["-coalesce".to_string()];
            wrapped.extend(effects);
            wrapped.extend(strings(["-layers", "Optimize"]));
            wrapped
        } else {
            effects
        };
        pipeline = pipeline.stage(
            PipelineStage::new("effects", ToolKind::RasterTool, args)
                .describe(if is_gif {
                    "Applying effects to GIF frames"
                } else {
                    "Applying effects"
                })
                .output_ext(if is_gif { "gif" } else { "png" }),
        );
    }

    if !animation.is_empty() {
        let mut args = animation;
        args.push("--optimize=3".into());
        pipeline = pipeline.stage(
            PipelineStage::new("animation", ToolKind::GifTool, args).describe("Applying GIF animations"),
        );
    }

    Ok(pipeline)
}
