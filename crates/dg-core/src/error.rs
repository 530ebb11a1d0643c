//! Unified error type for deskgif.
//!
//! All crates funnel their failures into [`Error`]. The variants follow the
//! orchestration taxonomy: input validation, tool failure, killed process,
//! deadline expiry. The CLI derives its exit status from [`Error::exit_code`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Why a tracked process was sent a termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillReason {
    /// The user asked for the operation to stop.
    User,
    /// The Timeout Supervisor's deadline elapsed.
    Timeout,
    /// The application is shutting down.
    Shutdown,
    /// The process died from a signal nobody in this process sent.
    External,
}

impl fmt::Display for KillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KillReason::User => "cancelled by user",
            KillReason::Timeout => "cancelled after timeout",
            KillReason::Shutdown => "cancelled on shutdown",
            KillReason::External => "terminated by signal",
        };
        f.write_str(s)
    }
}

/// Unified error type covering all failure modes in deskgif.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input failed validation; the operation was never attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An external tool exited with a non-zero status.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable description, including captured stderr.
        message: String,
    },

    /// An external tool was terminated by a signal.
    #[error("Process terminated [{tool}]: {reason}")]
    Killed {
        /// Name of the tool that was killed.
        tool: String,
        /// Who asked for the termination, if anyone in this process did.
        reason: KillReason,
    },

    /// The pipeline did not finish before its deadline.
    #[error("Operation timed out after {:.1} seconds", after.as_secs_f64())]
    Timeout {
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "operation", "tool").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Configuration could not be parsed or written.
    #[error("Config error: {0}")]
    Config(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to a process exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) => 2,
            Error::Tool { .. } => 3,
            Error::Killed { .. } => 4,
            Error::Timeout { .. } => 5,
            Error::NotFound { .. } => 6,
            Error::Io { .. } => 1,
            Error::Config(_) => 7,
            Error::Internal(_) => 1,
        }
    }

    /// Whether an automatic retry could succeed. Tool failures cannot be told
    /// apart from permanent ones, so nothing is retried.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// True when the error is a [`Error::Killed`] with the given reason.
    pub fn is_killed_by(&self, reason: KillReason) -> bool {
        matches!(self, Error::Killed { reason: r, .. } if *r == reason)
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = Error::validation("Invalid input file path provided");
        assert_eq!(
            err.to_string(),
            "Validation error: Invalid input file path provided"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn tool_display_carries_stderr() {
        let err = Error::tool("ffmpeg", "exited with status 1: Unknown encoder 'x'");
        assert_eq!(
            err.to_string(),
            "Tool error [ffmpeg]: exited with status 1: Unknown encoder 'x'"
        );
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn killed_reasons_are_distinct() {
        let user = Error::Killed {
            tool: "gifsicle".into(),
            reason: KillReason::User,
        };
        let timeout = Error::Killed {
            tool: "gifsicle".into(),
            reason: KillReason::Timeout,
        };
        assert!(user.is_killed_by(KillReason::User));
        assert!(!user.is_killed_by(KillReason::Timeout));
        assert!(timeout.is_killed_by(KillReason::Timeout));
        assert_ne!(user.to_string(), timeout.to_string());
    }

    #[test]
    fn timeout_display() {
        let err = Error::Timeout {
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Operation timed out after 30.0 seconds");
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn not_found_display() {
        let err = Error::not_found("operation", "sharpen");
        assert_eq!(err.to_string(), "operation not found: sharpen");
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn nothing_is_retryable() {
        assert!(!Error::tool("magick", "boom").is_retryable());
        assert!(!Error::Internal("x".into()).is_retryable());
    }

    #[test]
    fn kill_reason_serializes_snake_case() {
        let json = serde_json::to_string(&KillReason::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
    }
}
