//! Shared test harness for integration tests.
//!
//! Provides [`Harness`], which owns a scratch directory, a work directory and
//! a directory of fake tools. Fake tools are POSIX shell scripts standing in
//! for ffmpeg, ImageMagick and gifsicle.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use dg_av::{ToolKind, ToolRegistry};
use dg_core::config::Config;
use dg_pipeline::Orchestrator;
use tempfile::TempDir;

/// Writes a marker into the last argument (the output path).
pub const WRITE_LAST: &str = "for last; do :; done\nprintf 'fake output' > \"$last\"\n";

/// A gifsicle stand-in: `-I` prints a three-frame report, anything else
/// writes the output.
pub const FAKE_GIFSICLE: &str = "if [ \"$1\" = \"-I\" ]; then\n\
cat <<'EOF'\n\
* in.gif 3 images\n\
  + image #0 10x10\n\
    delay 0.10s\n\
  + image #1 10x10\n\
    delay 0.20s\n\
  + image #2 10x10\n\
    delay 0.30s\n\
EOF\n\
exit 0\n\
fi\n\
for last; do :; done\n\
printf 'fake output' > \"$last\"\n";

pub fn failing(message: &str) -> String {
    format!("echo '{message}' 1>&2\nexit 1\n")
}

pub fn sleeping(secs: f32) -> String {
    format!("exec sleep {secs}\n")
}

/// Appends each invocation's argv, one argument per line, to `log`, then
/// behaves like [`WRITE_LAST`].
pub fn logging(log: &Path) -> String {
    format!(
        "printf '%s\\n' \"$@\" >> '{}'\necho '--' >> '{}'\n{WRITE_LAST}",
        log.display(),
        log.display()
    )
}

pub struct Harness {
    pub tools_dir: TempDir,
    pub scratch: TempDir,
    pub work: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            tools_dir: tempfile::tempdir().expect("tools dir"),
            scratch: tempfile::tempdir().expect("scratch dir"),
            work: tempfile::tempdir().expect("work dir"),
        }
    }

    /// Write an executable script into the tools directory.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.tools_dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    pub fn tools(&self, scripts: &[(ToolKind, &str)]) -> ToolRegistry {
        ToolRegistry::from_paths(scripts.iter().enumerate().map(|(i, (kind, body))| {
            (*kind, self.script(&format!("{kind}_{i}"), body))
        }))
    }

    /// Configuration that keeps scratch files in this harness.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.temp.dir = Some(self.scratch.path().to_path_buf());
        config.processing.kill_grace_ms = 200;
        config.processing.use_gpu = false;
        config
    }

    pub fn orchestrator(&self, scripts: &[(ToolKind, &str)]) -> Orchestrator {
        Orchestrator::new(self.config(), self.tools(scripts))
    }

    /// Write a config file pointing every tool at a script, for the CLI.
    pub fn config_file(&self, transcoder: &str, gif: &str) -> PathBuf {
        let mut config = self.config();
        config.tools.transcoder = Some(self.script("ffmpeg", transcoder));
        config.tools.gif = Some(self.script("gifsicle", gif));
        config.tools.raster = Some(self.script("magick", WRITE_LAST));
        let path = self.work.path().join("deskgif.json");
        config.save(&path).expect("save config");
        path
    }

    pub fn source(&self, name: &str) -> PathBuf {
        let path = self.work.path().join(name);
        std::fs::write(&path, b"source bytes").expect("write source");
        path
    }

    pub fn scratch_entries(&self) -> BTreeSet<PathBuf> {
        std::fs::read_dir(self.scratch.path())
            .expect("read scratch")
            .map(|e| e.expect("entry").path())
            .collect()
    }
}

/// Split an argv log into one `Vec` per invocation.
pub fn invocations(log: &Path) -> Vec<Vec<String>> {
    let text = std::fs::read_to_string(log).unwrap_or_default();
    let mut calls = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        if line == "--" {
            calls.push(std::mem::take(&mut current));
        } else {
            current.push(line.to_string());
        }
    }
    calls
}
