//! Execution context shared by all stages in a pipeline run.

use std::sync::Arc;

use dg_av::{ArtifactManager, ProcessRegistry, StderrSink, ToolRegistry};
use dg_core::{KillReason, ProcessId};
use parking_lot::Mutex;

/// Sender for reporting progress from within a pipeline.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and a
/// human-readable step description.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress, clamped to 0 -- 100.
    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress.clamp(0.0, 100.0), step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Remembers the most recently spawned process of one pipeline run, so a
/// timeout can cancel whatever is currently in flight.
///
/// Once halted, the run must not start another stage.
#[derive(Debug, Clone, Default)]
pub struct ProcessTracker {
    last: Arc<Mutex<Option<ProcessId>>>,
    halted: Arc<Mutex<Option<KillReason>>>,
}

impl ProcessTracker {
    pub fn record(&self, id: &ProcessId) {
        *self.last.lock() = Some(id.clone());
    }

    pub fn last(&self) -> Option<ProcessId> {
        self.last.lock().clone()
    }

    /// Stop the run from spawning anything else and return the process
    /// that may still be in flight. The first reason wins.
    pub fn halt(&self, reason: KillReason) -> Option<ProcessId> {
        self.halted.lock().get_or_insert(reason);
        self.last()
    }

    pub fn halted(&self) -> Option<KillReason> {
        *self.halted.lock()
    }
}

/// Context passed through every stage of a pipeline run.
#[derive(Clone)]
pub struct PipelineContext {
    /// Tool locations.
    pub tools: Arc<ToolRegistry>,
    /// Registry every stage spawns through.
    pub processes: ProcessRegistry,
    /// Scratch file allocation.
    pub artifacts: ArtifactManager,
    /// Progress reporting for the caller.
    pub progress: Arc<ProgressSender>,
    /// Last-spawned process id of this run.
    pub tracker: ProcessTracker,
    /// Receives tool stderr as it is produced.
    pub stderr: Option<StderrSink>,
    /// Allow hardware acceleration flags on stages that support them.
    pub use_gpu: bool,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("processes", &self.processes)
            .field("artifacts", &self.artifacts)
            .field("use_gpu", &self.use_gpu)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    /// Create a new context with the minimum required fields.
    pub fn new(
        tools: Arc<ToolRegistry>,
        processes: ProcessRegistry,
        artifacts: ArtifactManager,
    ) -> Self {
        Self {
            tools,
            processes,
            artifacts,
            progress: Arc::new(ProgressSender::noop()),
            tracker: ProcessTracker::default(),
            stderr: None,
            use_gpu: false,
        }
    }

    /// Builder: attach a progress sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Builder: attach a process tracker.
    pub fn with_tracker(mut self, tracker: ProcessTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Builder: attach a stderr sink.
    pub fn with_stderr(mut self, sink: Option<StderrSink>) -> Self {
        self.stderr = sink;
        self
    }

    /// Builder: enable or disable GPU flags.
    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }
}
