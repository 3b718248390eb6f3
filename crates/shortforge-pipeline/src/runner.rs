//! One full pipeline pass: prompt, visual, audio, composition, publish.

use std::path::PathBuf;

use shortforge_av::RunWorkspace;
use shortforge_core::{
    Artifact, Capability, ChainExhausted, Error, ProviderError, PublishFailureKind, Result,
    RunFailure, RunId, RunReport, RunStatus, TargetSpec,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::context::ResolveContext;
use crate::stage::PipelineStage;

/// Observable progress of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    RunningPrompt,
    RunningVisual,
    RunningAudio,
    Composing,
    Publishing,
    Done { success: bool },
}

impl RunnerState {
    pub fn running(capability: Capability) -> Self {
        match capability {
            Capability::Prompt => Self::RunningPrompt,
            Capability::Visual => Self::RunningVisual,
            Capability::Audio => Self::RunningAudio,
            Capability::Composition => Self::Composing,
            Capability::Publish => Self::Publishing,
        }
    }
}

/// Per-run settings that do not change between runs.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub target: TargetSpec,
    /// Parent directory for run workspaces (system temp dir when `None`).
    pub work_dir: Option<PathBuf>,
    /// Keep the run workspace instead of deleting it.
    pub keep_artifacts: bool,
}

/// Executes pipeline runs. Holds no state between runs besides the
/// observable [`RunnerState`], which is back at `Idle` once a run returns.
pub struct JobRunner {
    stages: Vec<PipelineStage>,
    options: RunnerOptions,
    state: watch::Sender<RunnerState>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<Capability> = self.stages.iter().map(PipelineStage::capability).collect();
        f.debug_struct("JobRunner")
            .field("stages", &stages)
            .field("options", &self.options)
            .finish()
    }
}

impl JobRunner {
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless there is exactly one stage per
    /// capability, in pipeline order.
    pub fn new(stages: Vec<PipelineStage>, options: RunnerOptions) -> Result<Self> {
        let order: Vec<Capability> = stages.iter().map(PipelineStage::capability).collect();
        if order != Capability::ALL {
            return Err(Error::config(format!(
                "pipeline stages must be {:?}, got {:?}",
                Capability::ALL,
                order
            )));
        }

        let (state, _) = watch::channel(RunnerState::Idle);
        Ok(Self {
            stages,
            options,
            state,
        })
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// Execute one run. Never fails: every outcome is described by the
    /// returned report. The run workspace is removed on every exit path
    /// unless artifacts are kept.
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let run_id = RunId::new();
        let span = tracing::info_span!("run", run_id = %run_id.short());
        self.execute(run_id, cancel).instrument(span).await
    }

    async fn execute(&self, run_id: RunId, cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::new(run_id);
        tracing::info!(run_id = %run_id, "run started");

        let status = match RunWorkspace::new(self.options.work_dir.as_deref(), &run_id) {
            Ok(workspace) => {
                let mut ctx = ResolveContext::new(run_id, workspace.path(), self.options.target)
                    .with_cancellation(cancel.clone());
                let status = self.run_stages(&mut ctx, &mut report, cancel).await;
                self.release_workspace(workspace);
                status
            }
            Err(e) => RunStatus::Failed {
                capability: Capability::Prompt,
                failure: RunFailure::Workspace {
                    message: e.to_string(),
                },
            },
        };

        let success = matches!(status, RunStatus::Succeeded { .. });
        report.finish(status);
        self.state.send_replace(RunnerState::Done { success });
        report.log();
        // Let subscribers observe the outcome before returning to idle.
        tokio::task::yield_now().await;
        self.state.send_replace(RunnerState::Idle);
        report
    }

    async fn run_stages(
        &self,
        ctx: &mut ResolveContext,
        report: &mut RunReport,
        cancel: &CancellationToken,
    ) -> RunStatus {
        for stage in &self.stages {
            let capability = stage.capability();
            if cancel.is_cancelled() {
                return RunStatus::Cancelled {
                    before: Some(capability),
                };
            }
            self.state.send_replace(RunnerState::running(capability));

            // Cancellation is only observed between stages; a started
            // stage always runs to completion.
            match stage.run(ctx).await {
                Ok(outcome) => {
                    if let Some(artifact) = &outcome.artifact {
                        ctx.insert(artifact.clone());
                    }
                    report.record_stage(outcome);
                }
                Err(failure) => {
                    report.record_stage(failure.outcome);
                    return RunStatus::Failed {
                        capability,
                        failure: run_failure(capability, failure.exhausted),
                    };
                }
            }
        }

        match ctx
            .upstream(Capability::Publish)
            .and_then(Artifact::as_receipt)
        {
            Some(receipt) => RunStatus::Succeeded {
                receipt: receipt.clone(),
            },
            None => RunStatus::Failed {
                capability: Capability::Publish,
                failure: RunFailure::Publish {
                    kind: PublishFailureKind::Permanent,
                    message: "publish stage produced no receipt".into(),
                },
            },
        }
    }

    fn release_workspace(&self, workspace: RunWorkspace) {
        if self.options.keep_artifacts {
            let path = workspace.persist();
            tracing::info!(path = %path.display(), "kept run artifacts");
        } else if let Err(e) = workspace.close() {
            tracing::warn!(error = %e, "failed to remove run workspace");
        }
    }
}

/// Classify a stage failure for the run report.
fn run_failure(capability: Capability, exhausted: ChainExhausted) -> RunFailure {
    let last = exhausted
        .attempts
        .last()
        .and_then(|a| a.error())
        .cloned();

    match (capability, last) {
        (Capability::Composition, Some(error)) => RunFailure::Composition {
            message: error.to_string(),
        },
        (Capability::Publish, Some(ProviderError::Publish { kind, message })) => {
            RunFailure::Publish { kind, message }
        }
        _ => RunFailure::ChainExhausted { source: exhausted },
    }
}
