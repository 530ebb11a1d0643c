//! The orchestration façade used by front-ends.
//!
//! An [`Orchestrator`] owns the tool registry, the process registry and the
//! scratch-file manager for the life of the application. Each
//! [`run_operation`](Orchestrator::run_operation) call plans the named
//! operation, composes its stages, and runs them under a deadline whose
//! expiry cancels whatever process the run has in flight.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dg_av::{ArtifactManager, FileInfo, GifInfo, ProcessRegistry, StderrSink, ToolInfo, ToolRegistry};
use dg_core::config::Config;
use dg_core::validate::validate_source_path;
use dg_core::{KillReason, ProcessId, Result};
use serde_json::Value;

use crate::context::{PipelineContext, ProcessTracker, ProgressSender};
use crate::deadline::run_with_deadline;
use crate::executor::PipelineResult;
use crate::inspect::{inspect_frames, FrameThumbnail};
use crate::operations::Operation;
use crate::settings::MediaKind;

/// Per-call options for [`Orchestrator::run_operation`].
#[derive(Default)]
pub struct RunOptions {
    /// Overrides the configured deadline.
    pub timeout: Option<Duration>,
    pub progress: Option<ProgressSender>,
    pub stderr: Option<StderrSink>,
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    processes: ProcessRegistry,
    artifacts: ArtifactManager,
}

impl Orchestrator {
    pub fn new(config: Config, tools: ToolRegistry) -> Self {
        let processes = ProcessRegistry::new(config.processing.kill_grace());
        let artifacts = ArtifactManager::from_config(&config.temp);
        Self {
            config: Arc::new(config),
            tools: Arc::new(tools),
            processes,
            artifacts,
        }
    }

    /// Discover tools from the configuration and build an orchestrator.
    pub fn from_config(config: Config) -> Self {
        let tools = ToolRegistry::discover(&config.tools);
        Self::new(config, tools)
    }

    /// Clear scratch artifacts left behind by an earlier run that died.
    pub fn startup(&self) -> usize {
        self.artifacts.sweep_stale()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    pub fn list_operations(&self) -> Vec<&'static str> {
        Operation::ALL.iter().map(|op| op.name()).collect()
    }

    pub fn check_tools(&self) -> Vec<ToolInfo> {
        self.tools.check_all()
    }

    fn context(&self) -> PipelineContext {
        PipelineContext::new(
            Arc::clone(&self.tools),
            self.processes.clone(),
            self.artifacts.clone(),
        )
        .with_gpu(self.config.processing.use_gpu)
    }

    /// Run the named operation on `input`, writing the result to `output`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown operation, `Validation` for bad paths or
    /// settings, `Timeout` when the deadline passes, and the failing stage's
    /// `Tool` or `Killed` error otherwise.
    pub async fn run_operation(
        &self,
        name: &str,
        input: &Path,
        output: &Path,
        settings: &Value,
        options: RunOptions,
    ) -> Result<PipelineResult> {
        let operation: Operation = name.parse()?;
        let pipeline = operation.plan(
            settings,
            &self.config.defaults,
            MediaKind::from_path(input),
        )?;
        let deadline = options
            .timeout
            .unwrap_or_else(|| self.config.processing.timeout_for(operation.name()));

        let tracker = ProcessTracker::default();
        let mut ctx = self
            .context()
            .with_tracker(tracker.clone())
            .with_stderr(options.stderr);
        if let Some(progress) = options.progress {
            ctx = ctx.with_progress(progress);
        }

        tracing::info!(
            operation = operation.name(),
            input = %input.display(),
            stages = pipeline.len(),
            "Running operation"
        );
        let processes = self.processes.clone();
        run_with_deadline(
            || pipeline.run(&ctx, input, output),
            deadline,
            move || {
                if let Some(id) = tracker.halt(KillReason::Timeout) {
                    processes.cancel(&id, KillReason::Timeout);
                }
            },
        )
        .await
    }

    /// Ask the process with this id to stop. Returns `false` when it is not
    /// (or no longer) registered.
    pub fn cancel(&self, id: &ProcessId) -> bool {
        self.processes.cancel(id, KillReason::User)
    }

    /// Frame delays and thumbnails of a GIF.
    pub async fn inspect_frames(
        &self,
        input: &Path,
        timeout: Option<Duration>,
    ) -> Result<Vec<FrameThumbnail>> {
        let deadline = timeout.unwrap_or_else(|| self.config.processing.frames_timeout());
        let tracker = ProcessTracker::default();
        let ctx = self.context().with_tracker(tracker.clone());
        let processes = self.processes.clone();
        run_with_deadline(
            || inspect_frames(&ctx, input),
            deadline,
            move || {
                if let Some(id) = tracker.halt(KillReason::Timeout) {
                    processes.cancel(&id, KillReason::Timeout);
                }
            },
        )
        .await
    }

    /// Frame count and delays of a GIF without thumbnails.
    pub async fn gif_info(&self, input: &Path) -> Result<GifInfo> {
        validate_source_path(input).into_result("Invalid input file path provided")?;
        dg_av::probe_gif(
            &self.tools,
            &self.processes,
            input,
            ProcessId::generate("gifsicle_info"),
        )
        .await
    }

    pub fn file_info(&self, path: &Path) -> Result<FileInfo> {
        validate_source_path(path).into_result("Invalid file path provided")?;
        dg_av::file_info(path)
    }

    /// Stop every tracked process and clear scratch artifacts.
    pub fn shutdown(&self) {
        let cancelled = self.processes.cancel_all(KillReason::Shutdown);
        let swept = self.artifacts.sweep_stale();
        tracing::info!(cancelled, swept, "Shut down");
    }
}
