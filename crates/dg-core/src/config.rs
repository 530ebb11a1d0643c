//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool locations, timeouts, operation defaults and temp-file naming. Every
//! section defaults sensibly so a completely empty `{}` file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::validate;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub processing: ProcessingConfig,
    pub defaults: DefaultsConfig,
    pub temp: TempConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist, or it cannot be parsed.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let value =
            serde_json::to_value(self).map_err(|e| Error::Config(format!("serialize: {e}")))?;
        validate::validate_option_bag(&value).into_result("Invalid settings object provided")?;
        let json = serde_json::to_string_pretty(&value)
            .map_err(|e| Error::Config(format!("serialize: {e}")))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.processing.timeout_ms == 0 {
            warnings.push("processing.timeout_ms is 0; every operation will time out".into());
        }
        for (op, ms) in &self.processing.operation_timeouts_ms {
            if *ms == 0 {
                warnings.push(format!("processing.operation_timeouts_ms.{op} is 0"));
            }
        }

        for (name, path) in [
            ("transcoder", &self.tools.transcoder),
            ("raster", &self.tools.raster),
            ("gif", &self.tools.gif),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!("tools.{name} {} does not exist", p.display()));
                }
            }
        }
        if let Some(ref dir) = self.tools.binaries_dir {
            if !dir.is_dir() {
                warnings.push(format!("tools.binaries_dir {} is not a directory", dir.display()));
            }
        }

        if self.temp.prefix.is_empty() {
            warnings.push("temp.prefix is empty; the startup sweep is disabled".into());
        } else if !self
            .temp
            .prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            warnings.push(format!(
                "temp.prefix '{}' should only contain ASCII letters, digits or '-'",
                self.temp.prefix
            ));
        }

        if self.defaults.width == 0 || self.defaults.height == 0 {
            warnings.push("defaults.width and defaults.height must be positive".into());
        }
        if self.defaults.fps == 0 {
            warnings.push("defaults.fps must be positive".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Locations of the external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit path to the video transcoder (ffmpeg).
    pub transcoder: Option<PathBuf>,
    /// Explicit path to the raster-image tool (ImageMagick `magick`).
    pub raster: Option<PathBuf>,
    /// Explicit path to the GIF tool (gifsicle).
    pub gif: Option<PathBuf>,
    /// Bundled binaries, laid out as `<dir>/<platform>/<name><exe-suffix>`.
    pub binaries_dir: Option<PathBuf>,
}

/// Timeouts and process handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Default deadline for a whole operation.
    pub timeout_ms: u64,
    /// Per-operation deadline overrides, keyed by operation name.
    pub operation_timeouts_ms: BTreeMap<String, u64>,
    /// Deadline for GIF frame inspection.
    pub frames_timeout_ms: u64,
    /// Add hardware-acceleration flags to transcoder invocations.
    pub use_gpu: bool,
    /// Time between the polite termination signal and a hard kill.
    pub kill_grace_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            operation_timeouts_ms: BTreeMap::new(),
            frames_timeout_ms: 120_000,
            use_gpu: true,
            kill_grace_ms: 1_500,
        }
    }
}

impl ProcessingConfig {
    /// Deadline for the named operation.
    pub fn timeout_for(&self, operation: &str) -> Duration {
        let ms = self
            .operation_timeouts_ms
            .get(operation)
            .copied()
            .unwrap_or(self.timeout_ms);
        Duration::from_millis(ms)
    }

    pub fn frames_timeout(&self) -> Duration {
        Duration::from_millis(self.frames_timeout_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// User defaults that seed operation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_compression: u32,
    pub compression_level: u32,
    pub loop_count: i32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fps: 15,
            video_compression: 80,
            compression_level: 80,
            loop_count: 0,
        }
    }
}

/// Temp-file naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempConfig {
    /// Prefix of every scratch artifact; the startup sweep deletes entries
    /// that start with `<prefix>_`.
    pub prefix: String,
    /// Scratch directory; the OS temp directory when unset.
    pub dir: Option<PathBuf>,
}

impl Default for TempConfig {
    fn default() -> Self {
        Self {
            prefix: "DeskGif".into(),
            dir: None,
        }
    }
}

impl TempConfig {
    /// The directory scratch artifacts are allocated in.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
