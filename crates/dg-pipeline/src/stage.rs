//! Pipeline stages: one external tool invocation each.
//!
//! A [`Pipeline`] is an ordered list of [`PipelineStage`]s planned by an
//! operation. Each stage names its tool, where its input comes from, and a
//! builder that turns the run's concrete paths into the stage's own
//! arguments. The last stage's output is the final artifact; every other
//! output is an intermediate owned by the run's artifact scope.

use std::path::{Path, PathBuf};

use dg_av::ToolKind;

/// Where a stage reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageInput {
    /// The caller's source file.
    Source,
    /// The output of the stage immediately before this one.
    Previous,
    /// The output of the stage at this index.
    Stage(usize),
}

/// Concrete paths handed to an argument builder.
#[derive(Debug, Clone, Copy)]
pub struct StagePaths<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    /// Outputs of every stage in the pipeline, by index.
    pub outputs: &'a [PathBuf],
}

impl StagePaths<'_> {
    /// Output path of stage `index` as an argument.
    pub fn output_of(&self, index: usize) -> String {
        self.outputs
            .get(index)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

type ArgsBuilder = Box<dyn Fn(&StagePaths<'_>) -> Vec<String> + Send + Sync>;

/// One step of a pipeline.
pub struct PipelineStage {
    pub(crate) name: &'static str,
    pub(crate) label: String,
    pub(crate) tool: ToolKind,
    pub(crate) input: StageInput,
    pub(crate) output_ext: String,
    pub(crate) gpu: bool,
    args: ArgsBuilder,
}

impl PipelineStage {
    /// A stage reading the previous stage's output (or the source, for the
    /// first stage) with a fixed argument list.
    pub fn new(name: &'static str, tool: ToolKind, args: Vec<String>) -> Self {
        Self::with_args(name, tool, move |_| args.clone())
    }

    /// A stage whose arguments depend on the run's paths.
    pub fn with_args(
        name: &'static str,
        tool: ToolKind,
        args: impl Fn(&StagePaths<'_>) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            label: name.to_string(),
            tool,
            input: StageInput::Previous,
            output_ext: String::new(),
            gpu: true,
            args: Box::new(args),
        }
    }

    /// Builder: human-readable progress text.
    pub fn describe(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Builder: where the input comes from.
    pub fn input(mut self, input: StageInput) -> Self {
        self.input = input;
        self
    }

    /// Builder: extension of this stage's intermediate output. Ignored for
    /// the final stage, which takes the destination's extension.
    pub fn output_ext(mut self, ext: &str) -> Self {
        self.output_ext = ext.trim_start_matches('.').to_string();
        self
    }

    /// Builder: allow or forbid hardware acceleration for this stage.
    pub fn gpu(mut self, gpu: bool) -> Self {
        self.gpu = gpu;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    /// The stage's own arguments for the given paths.
    pub fn build_args(&self, paths: &StagePaths<'_>) -> Vec<String> {
        (self.args)(paths)
    }
}

impl std::fmt::Debug for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStage")
            .field("name", &self.name)
            .field("tool", &self.tool)
            .field("input", &self.input)
            .field("output_ext", &self.output_ext)
            .field("gpu", &self.gpu)
            .finish_non_exhaustive()
    }
}

/// An ordered, planned list of stages.
#[derive(Debug)]
pub struct Pipeline {
    pub(crate) operation: &'static str,
    pub(crate) stages: Vec<PipelineStage>,
}

impl Pipeline {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            stages: Vec::new(),
        }
    }

    /// Builder: append a stage.
    pub fn stage(mut self, stage: PipelineStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
