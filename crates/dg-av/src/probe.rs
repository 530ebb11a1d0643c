//! GIF metadata probing and file info.
//!
//! [`probe_gif`] runs the GIF tool in information mode and parses its text
//! report into per-frame delays. The report puts `image #N` on one line and
//! the frame's `delay` either on the same line or on an indented line below
//! it, so parsing tracks the current image across lines.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use dg_core::{ProcessId, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::command::path_arg;
use crate::process::ProcessRegistry;
use crate::tools::{ToolKind, ToolRegistry};

static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)image\s+#(\d+)").expect("valid regex"));
static DELAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdelay\s+(\d+(?:\.\d+)?)(s)?").expect("valid regex"));

/// Timing of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTiming {
    /// Frame index as reported by the tool (0-based).
    pub index: usize,
    /// Display duration in milliseconds.
    pub delay_ms: u32,
}

/// Parsed GIF information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GifInfo {
    /// Number of frames.
    pub frames: usize,
    /// Per-frame timing, in file order.
    pub timings: Vec<FrameTiming>,
    /// Unparsed tool report.
    pub raw: String,
}

impl GifInfo {
    /// Parse the information-mode report.
    ///
    /// Delays written with an `s` suffix are seconds; bare numbers are
    /// centiseconds. Frames without a delay get 0.
    pub fn parse(report: &str) -> Self {
        let mut timings: Vec<FrameTiming> = Vec::new();
        let mut current: Option<usize> = None;

        for line in report.lines() {
            if let Some(caps) = IMAGE_RE.captures(line) {
                if let Ok(index) = caps[1].parse::<usize>() {
                    timings.push(FrameTiming { index, delay_ms: 0 });
                    current = Some(timings.len() - 1);
                }
            }
            if let (Some(slot), Some(caps)) = (current, DELAY_RE.captures(line)) {
                let value: f64 = caps[1].parse().unwrap_or(0.0);
                let ms = if caps.get(2).is_some() {
                    value * 1000.0
                } else {
                    value * 10.0
                };
                timings[slot].delay_ms = ms.round() as u32;
            }
        }

        Self {
            frames: timings.len(),
            timings,
            raw: report.to_string(),
        }
    }
}

/// Run the GIF probe on `input`.
pub async fn probe_gif(
    tools: &ToolRegistry,
    processes: &ProcessRegistry,
    input: &Path,
    id: ProcessId,
) -> Result<GifInfo> {
    let mut cmd = tools.command(ToolKind::Probe)?;
    cmd.args(ToolKind::Probe.assemble(&[], path_arg(input)?, "", false));
    let output = processes.run(&cmd, id, None).await?;
    let info = GifInfo::parse(&output.stdout);
    tracing::debug!(input = %input.display(), frames = info.frames, "Probed GIF");
    Ok(info)
}

/// Size and timestamps of a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub size: u64,
    /// Not every filesystem records a creation time.
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

pub fn file_info(path: &Path) -> Result<FileInfo> {
    let meta = std::fs::metadata(path)?;
    Ok(FileInfo {
        size: meta.len(),
        created: meta.created().ok().map(DateTime::<Utc>::from),
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
    })
}
