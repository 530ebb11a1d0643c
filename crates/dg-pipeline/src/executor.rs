//! Pipeline composer: runs a planned [`Pipeline`] against one source file.
//!
//! Every stage's paths and arguments are resolved and validated before the
//! first process is spawned. Stages then run strictly in order through the
//! process registry. The final stage writes to a scratch file that is moved
//! onto the destination only after the whole pipeline succeeds. All
//! intermediates live in one [`ArtifactScope`](dg_av::ArtifactScope) and are
//! released when the run ends, however it ends.

use std::path::{Path, PathBuf};

use dg_av::{finalize, path_arg, ToolCommand};
use dg_core::validate::{
    validate_argument_vector, validate_destination_path, validate_source_path, DestinationOptions,
};
use dg_core::{Error, ProcessId, Result};
use serde::Serialize;

use crate::context::PipelineContext;
use crate::stage::{Pipeline, StageInput, StagePaths};

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Where the result was written.
    pub final_artifact_path: PathBuf,
    /// Id of the last process the run spawned.
    pub process_id: ProcessId,
}

struct PlannedStage {
    command: ToolCommand,
    id: ProcessId,
}

impl Pipeline {
    /// Run every stage against `source`, writing the result to `destination`.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before anything is spawned. The first
    /// failing stage's error is returned unchanged; later stages never run.
    pub async fn run(
        &self,
        ctx: &PipelineContext,
        source: &Path,
        destination: &Path,
    ) -> Result<PipelineResult> {
        validate_source_path(source).into_result("Invalid input file path provided")?;
        validate_destination_path(destination, &DestinationOptions::default())
            .into_result("Invalid output file path provided")?;

        if self.stages.is_empty() {
            return Err(Error::Internal(format!(
                "{} planned no stages",
                self.operation
            )));
        }

        let mut scope = ctx.artifacts.scope();
        let total = self.stages.len();
        let final_ext = destination
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let outputs: Vec<PathBuf> = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, stage)| {
                let ext = if i + 1 == total {
                    final_ext.as_str()
                } else {
                    stage.output_ext.as_str()
                };
                scope.allocate(ext)
            })
            .collect();

        let planned = self.plan(ctx, source, &outputs)?;

        for (i, (stage, planned)) in self.stages.iter().zip(&planned).enumerate() {
            let pct = i as f32 / total as f32 * 100.0;
            ctx.progress.send(pct, &stage.label);
            tracing::info!(
                operation = self.operation,
                stage = stage.name,
                process_id = %planned.id,
                "[{pct:.0}%] Starting: {}",
                stage.label
            );
            if let Some(reason) = ctx.tracker.halted() {
                tracing::warn!(operation = self.operation, stage = stage.name, %reason, "Run halted before stage");
                return Err(Error::Killed {
                    tool: stage.tool.binary_name().to_string(),
                    reason,
                });
            }
            ctx.tracker.record(&planned.id);

            if let Err(e) = ctx
                .processes
                .run(&planned.command, planned.id.clone(), ctx.stderr.clone())
                .await
            {
                tracing::error!(operation = self.operation, stage = stage.name, "Stage failed: {e}");
                return Err(e);
            }
        }

        let final_path = finalize(&outputs[total - 1], destination)?;
        scope.release_all();

        ctx.progress.send(100.0, "Complete");
        tracing::info!(
            operation = self.operation,
            output = %final_path.display(),
            "[100%] Completed"
        );

        Ok(PipelineResult {
            final_artifact_path: final_path,
            process_id: planned[total - 1].id.clone(),
        })
    }

    /// Resolve inputs, build and validate every stage's argv.
    fn plan(
        &self,
        ctx: &PipelineContext,
        source: &Path,
        outputs: &[PathBuf],
    ) -> Result<Vec<PlannedStage>> {
        let options = DestinationOptions::default();
        let mut planned = Vec::with_capacity(self.stages.len());

        for (i, stage) in self.stages.iter().enumerate() {
            let input = match stage.input {
                StageInput::Source => source,
                StageInput::Previous if i == 0 => source,
                StageInput::Previous => outputs[i - 1].as_path(),
                StageInput::Stage(k) if k < i => outputs[k].as_path(),
                StageInput::Stage(k) => {
                    return Err(Error::Internal(format!(
                        "stage {} reads the output of stage {k}, which runs later",
                        stage.name
                    )));
                }
            };
            let output = outputs[i].as_path();
            validate_destination_path(output, &options)
                .into_result("Invalid intermediate file path")?;

            let args = stage.build_args(&StagePaths {
                input,
                output,
                outputs,
            });
            validate_argument_vector(&args)
                .into_result(&format!("Invalid arguments for stage {}", stage.name))?;

            let mut command = ctx.tools.command(stage.tool)?;
            command.args(stage.tool.assemble(
                &args,
                path_arg(input)?,
                path_arg(output)?,
                stage.gpu && ctx.use_gpu,
            ));
            let id = ProcessId::generate(&format!("{}_{}", stage.tool.binary_name(), stage.name));
            planned.push(PlannedStage { command, id });
        }

        Ok(planned)
    }
}
