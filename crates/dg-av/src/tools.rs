//! External tool detection and argv assembly.
//!
//! The [`ToolRegistry`] resolves where each of the three media tools lives
//! and hands out [`ToolCommand`]s for them. Resolution order per tool:
//! explicit config path, then the bundled `<binaries_dir>/<platform>/<name>`
//! layout, then `PATH`. Tests inject fake executables with
//! [`ToolRegistry::from_paths`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use dg_core::config::ToolsConfig;
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

/// The kinds of external tool the orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Video transcoder (ffmpeg).
    Transcoder,
    /// Raster image tool (ImageMagick).
    RasterTool,
    /// GIF tool (gifsicle).
    GifTool,
    /// GIF information mode of the GIF tool (`gifsicle -I`).
    Probe,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Transcoder,
        ToolKind::RasterTool,
        ToolKind::GifTool,
        ToolKind::Probe,
    ];

    /// Executable name, without platform suffix.
    pub fn binary_name(self) -> &'static str {
        match self {
            ToolKind::Transcoder => "ffmpeg",
            ToolKind::RasterTool => "magick",
            ToolKind::GifTool | ToolKind::Probe => "gifsicle",
        }
    }

    fn configured_path(self, config: &ToolsConfig) -> Option<&Path> {
        match self {
            ToolKind::Transcoder => config.transcoder.as_deref(),
            ToolKind::RasterTool => config.raster.as_deref(),
            ToolKind::GifTool | ToolKind::Probe => config.gif.as_deref(),
        }
    }

    fn version_arg(self) -> &'static str {
        match self {
            ToolKind::Transcoder => "-version",
            _ => "--version",
        }
    }

    /// Build the complete argv for one invocation of this tool.
    ///
    /// `args` are the stage's own arguments; input and output placement
    /// follows each tool's command-line convention. `gpu` only affects the
    /// transcoder.
    pub fn assemble(self, args: &[String], input: &str, output: &str, gpu: bool) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 6);
        match self {
            ToolKind::Transcoder => {
                if gpu {
                    argv.extend(["-hwaccel".to_string(), "auto".to_string()]);
                    if cfg!(windows) {
                        argv.extend(["-hwaccel_device".to_string(), "0".to_string()]);
                    }
                }
                argv.extend(["-i".to_string(), input.to_string()]);
                argv.extend(args.iter().cloned());
                argv.push(output.to_string());
            }
            ToolKind::RasterTool => {
                argv.push(input.to_string());
                argv.extend(args.iter().cloned());
                argv.push(output.to_string());
            }
            ToolKind::GifTool => {
                argv.extend(args.iter().cloned());
                argv.push(input.to_string());
                argv.extend(["-o".to_string(), output.to_string()]);
            }
            ToolKind::Probe => {
                argv.push("-I".to_string());
                argv.extend(args.iter().cloned());
                argv.push(input.to_string());
            }
        }
        argv
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub kind: ToolKind,
    /// Executable name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of the version output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding resolved tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolKind, PathBuf>,
}

impl ToolRegistry {
    /// Resolve every known tool. Tools that cannot be found are omitted and
    /// surface later as a not-found error from [`ToolRegistry::require`].
    pub fn discover(config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for kind in ToolKind::ALL {
            let name = kind.binary_name();
            let resolved = kind
                .configured_path(config)
                .filter(|p| {
                    let exists = p.exists();
                    if !exists {
                        tracing::warn!(tool = name, path = %p.display(), "Configured tool path does not exist; falling back");
                    }
                    exists
                })
                .map(Path::to_path_buf)
                .or_else(|| {
                    config
                        .binaries_dir
                        .as_deref()
                        .map(|dir| bundled_path(dir, name))
                        .filter(|p| p.is_file())
                })
                .or_else(|| which::which(name).ok());

            match resolved {
                Some(path) => {
                    tracing::debug!(tool = name, path = %path.display(), "Resolved tool");
                    tools.insert(kind, path);
                }
                None => tracing::debug!(tool = name, "Tool not found"),
            }
        }

        Self { tools }
    }

    /// Build a registry from explicit locations.
    pub fn from_paths(paths: impl IntoIterator<Item = (ToolKind, PathBuf)>) -> Self {
        Self {
            tools: paths.into_iter().collect(),
        }
    }

    /// Location of the given tool, or [`dg_core::Error::NotFound`].
    pub fn require(&self, kind: ToolKind) -> dg_core::Result<&Path> {
        self.tools
            .get(&kind)
            .map(PathBuf::as_path)
            .ok_or_else(|| dg_core::Error::not_found("tool", kind.binary_name()))
    }

    /// A fresh command for the given tool.
    pub fn command(&self, kind: ToolKind) -> dg_core::Result<ToolCommand> {
        Ok(ToolCommand::new(kind, self.require(kind)?.to_path_buf()))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        ToolKind::ALL
            .iter()
            .map(|&kind| {
                let path = self.tools.get(&kind);
                ToolInfo {
                    kind,
                    name: kind.binary_name().to_string(),
                    available: path.is_some(),
                    version: path.and_then(|p| detect_version(kind, p)),
                    path: path.cloned(),
                }
            })
            .collect()
    }
}

/// `<dir>/<platform>/<name><exe-suffix>`, using the platform names the
/// bundled binaries are packaged under.
fn bundled_path(dir: &Path, name: &str) -> PathBuf {
    let platform = match std::env::consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        other => other,
    };
    dir.join(platform)
        .join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
}

/// Run the tool's version flag and return the first line of stdout.
fn detect_version(kind: ToolKind, path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg(kind.version_arg())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.trim().to_string())
}
