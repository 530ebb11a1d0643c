//! Builder for one external tool invocation.
//!
//! A [`ToolCommand`] is only an argv; it is run through
//! [`ProcessRegistry::spawn`](crate::process::ProcessRegistry::spawn) so the
//! invocation is tracked and cancellable. Arguments are passed directly to
//! the executable, never through a shell.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::tools::ToolKind;

/// A path as an argv element. Paths that are not UTF-8 are rejected.
pub fn path_arg(path: &Path) -> dg_core::Result<&str> {
    path.to_str()
        .ok_or_else(|| dg_core::Error::validation(format!("path is not valid UTF-8: {}", path.display())))
}

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use dg_av::{ToolCommand, ToolKind};
/// use std::path::PathBuf;
///
/// let mut cmd = ToolCommand::new(ToolKind::GifTool, PathBuf::from("gifsicle"));
/// cmd.args(["--optimize=3", "in.gif", "-o", "out.gif"]);
/// assert_eq!(cmd.argv().len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    kind: ToolKind,
    program: PathBuf,
    args: Vec<String>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(kind: ToolKind, program: PathBuf) -> Self {
        Self {
            kind,
            program,
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// Short name used in errors and logs: the executable's file name.
    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.kind.binary_name().to_string())
    }

    /// The tokio command with piped output. On unix the child leads its own
    /// process group so a termination signal reaches any helpers it forks.
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_args() {
        let mut cmd = ToolCommand::new(ToolKind::Transcoder, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        cmd.arg("-i").arg("in.mp4").args(["-y", "out.gif"]);
        assert_eq!(cmd.argv(), &["-i", "in.mp4", "-y", "out.gif"]);
        assert_eq!(cmd.kind(), ToolKind::Transcoder);
    }

    #[test]
    fn display_name_is_file_name() {
        let cmd = ToolCommand::new(ToolKind::RasterTool, PathBuf::from("/usr/local/bin/magick"));
        assert_eq!(cmd.display_name(), "magick");
    }
}
