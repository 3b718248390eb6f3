//! Per-run observability: attempts, stage outcomes, and the run report.
//!
//! A [`RunReport`] is built incrementally by the job runner and rendered as
//! structured log lines by [`RunReport::log`]. It is detailed enough to
//! reconstruct which provider served each capability and why any fallback
//! occurred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::artifact::{Artifact, PublishReceipt};
use crate::capability::Capability;
use crate::error::{ProviderError, PublishFailureKind};
use crate::ids::RunId;

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Result of trying one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { error: ProviderError },
}

/// One provider attempt within a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

impl ProviderAttempt {
    pub fn succeeded(provider: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            provider: provider.into(),
            outcome: AttemptOutcome::Succeeded,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failed(provider: impl Into<String>, error: ProviderError, elapsed: Duration) -> Self {
        Self {
            provider: provider.into(),
            outcome: AttemptOutcome::Failed { error },
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Succeeded)
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match &self.outcome {
            AttemptOutcome::Failed { error } => Some(error),
            AttemptOutcome::Succeeded => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage outcome
// ---------------------------------------------------------------------------

/// Everything that happened while resolving one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub capability: Capability,
    /// Attempts in the order they were made.
    pub attempts: Vec<ProviderAttempt>,
    pub artifact: Option<Artifact>,
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        self.artifact.is_some()
    }

    /// Name of the provider whose artifact was accepted.
    pub fn resolved_by(&self) -> Option<&str> {
        self.artifact.as_ref().map(|a| a.provider.as_str())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProviderAttempt> {
        self.attempts.iter().filter(|a| !a.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn last_error(&self) -> Option<&ProviderError> {
        self.attempts.iter().rev().find_map(|a| a.error())
    }
}

/// Every provider for a capability failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("all {} providers for {capability} failed", attempts.len())]
pub struct ChainExhausted {
    pub capability: Capability,
    /// One entry per provider, in priority order.
    pub attempts: Vec<ProviderAttempt>,
}

// ---------------------------------------------------------------------------
// Run status
// ---------------------------------------------------------------------------

/// The first fatal failure of a run.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunFailure {
    #[error("{source}")]
    ChainExhausted { source: ChainExhausted },

    #[error("composition failed: {message}")]
    Composition { message: String },

    #[error("publish failed ({kind}): {message}")]
    Publish {
        kind: PublishFailureKind,
        message: String,
    },

    /// The run workspace could not be created.
    #[error("workspace error: {message}")]
    Workspace { message: String },
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded {
        receipt: PublishReceipt,
    },
    Failed {
        capability: Capability,
        failure: RunFailure,
    },
    /// Cancelled by the caller; `before` is the first stage that did not
    /// complete.
    Cancelled {
        before: Option<Capability>,
    },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// The outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    /// Stage outcomes in pipeline order; a stage appears only if every
    /// earlier stage succeeded.
    pub stages: Vec<StageOutcome>,
    pub status: Option<RunStatus>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            stages: Vec::new(),
            status: None,
            finished_at: None,
        }
    }

    /// Append a stage outcome.
    ///
    /// # Panics
    ///
    /// Panics if the outcome would break pipeline ordering: the previous
    /// stage must be this capability's predecessor and must have succeeded.
    pub fn record_stage(&mut self, outcome: StageOutcome) {
        let expected = outcome.capability.predecessor();
        let previous = self.stages.last();
        assert_eq!(
            previous.map(|s| s.capability),
            expected,
            "stage {} recorded out of pipeline order",
            outcome.capability
        );
        assert!(
            previous.map_or(true, StageOutcome::succeeded),
            "stage {} recorded after a failed stage",
            outcome.capability
        );
        self.stages.push(outcome);
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = Some(status);
        self.finished_at = Some(Utc::now());
    }

    pub fn stage(&self, capability: Capability) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.capability == capability)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(RunStatus::Succeeded { .. }))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, Some(RunStatus::Cancelled { .. }))
    }

    pub fn failed_capability(&self) -> Option<Capability> {
        match &self.status {
            Some(RunStatus::Failed { capability, .. }) => Some(*capability),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.finished_at
            .and_then(|end| (end - self.started_at).to_std().ok())
    }

    /// Render the report as structured log lines.
    pub fn log(&self) {
        let run_id = self.run_id.to_string();

        for stage in &self.stages {
            for attempt in &stage.attempts {
                match attempt.error() {
                    Some(error) => tracing::warn!(
                        run_id = %run_id,
                        capability = %stage.capability,
                        provider = %attempt.provider,
                        class = error.class(),
                        elapsed_ms = attempt.elapsed_ms,
                        error = %error,
                        "provider attempt failed"
                    ),
                    None => tracing::debug!(
                        run_id = %run_id,
                        capability = %stage.capability,
                        provider = %attempt.provider,
                        elapsed_ms = attempt.elapsed_ms,
                        "provider attempt succeeded"
                    ),
                }
            }

            match &stage.artifact {
                Some(artifact) => tracing::info!(
                    run_id = %run_id,
                    capability = %stage.capability,
                    provider = %artifact.provider,
                    fallbacks = stage.failure_count(),
                    artifact = %artifact.summary(),
                    "stage resolved"
                ),
                None => tracing::error!(
                    run_id = %run_id,
                    capability = %stage.capability,
                    attempts = stage.attempts.len(),
                    "stage failed"
                ),
            }
        }

        let elapsed_ms = self.elapsed().map(|d| d.as_millis() as u64).unwrap_or(0);
        match &self.status {
            Some(RunStatus::Succeeded { receipt }) => tracing::info!(
                run_id = %run_id,
                publish_id = %receipt.id,
                url = receipt.url.as_deref().unwrap_or(""),
                elapsed_ms,
                "run succeeded"
            ),
            Some(RunStatus::Failed {
                capability,
                failure,
            }) => tracing::error!(
                run_id = %run_id,
                capability = %capability,
                elapsed_ms,
                error = %failure,
                "run failed"
            ),
            Some(RunStatus::Cancelled { before }) => tracing::warn!(
                run_id = %run_id,
                before = before.map(|c| c.as_str()).unwrap_or("none"),
                elapsed_ms,
                "run cancelled"
            ),
            None => tracing::warn!(run_id = %run_id, "run report has no final status"),
        }
    }
}
