//! Fake tools for unit tests: small shell scripts standing in for the media
//! tools, injected through `ToolRegistry::from_paths`.

use std::collections::BTreeSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dg_av::{ArtifactManager, ProcessRegistry, ToolKind, ToolRegistry};
use tempfile::TempDir;

use crate::context::PipelineContext;

/// Writes a marker into the last argument, which every tool convention
/// treats as the output path.
pub const WRITE_LAST: &str = "for last; do :; done\nprintf 'fake output' > \"$last\"\n";

pub fn failing(message: &str) -> String {
    format!("echo '{message}' 1>&2\nexit 1\n")
}

pub fn sleeping(secs: f32) -> String {
    format!("exec sleep {secs}\n")
}

/// Write an executable script and return its path.
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Scratch, source and tool directories for one test.
pub struct Fixture {
    pub tools_dir: TempDir,
    pub scratch: TempDir,
    pub work: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            tools_dir: tempfile::tempdir().unwrap(),
            scratch: tempfile::tempdir().unwrap(),
            work: tempfile::tempdir().unwrap(),
        }
    }

    /// Register one script per tool kind.
    pub fn tools(&self, scripts: &[(ToolKind, &str)]) -> ToolRegistry {
        ToolRegistry::from_paths(scripts.iter().enumerate().map(|(i, (kind, body))| {
            (*kind, script(self.tools_dir.path(), &format!("{kind}_{i}"), body))
        }))
    }

    pub fn context(&self, tools: ToolRegistry) -> PipelineContext {
        PipelineContext::new(
            Arc::new(tools),
            ProcessRegistry::new(Duration::from_millis(200)),
            ArtifactManager::new(self.scratch.path(), "DeskGif"),
        )
    }

    /// Create a source file in the work directory.
    pub fn source(&self, name: &str) -> PathBuf {
        let path = self.work.path().join(name);
        std::fs::write(&path, b"source bytes").unwrap();
        path
    }

    pub fn scratch_entries(&self) -> BTreeSet<PathBuf> {
        std::fs::read_dir(self.scratch.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}
