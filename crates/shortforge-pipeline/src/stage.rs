//! A pipeline stage: one resolver chain plus validation of its output.

use shortforge_core::{Capability, ChainExhausted, StageOutcome};

use crate::chain::{ChainCursor, ResolverChain};
use crate::context::ResolveContext;
use crate::validate::{validate, ValidationLimits};

/// Every provider of the stage failed or was rejected.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{exhausted}")]
pub struct StageFailure {
    /// The stage outcome, without an artifact.
    pub outcome: StageOutcome,
    pub exhausted: ChainExhausted,
}

#[derive(Debug, Clone)]
pub struct PipelineStage {
    chain: ResolverChain,
    limits: ValidationLimits,
}

impl PipelineStage {
    pub fn new(chain: ResolverChain, limits: ValidationLimits) -> Self {
        Self { chain, limits }
    }

    pub fn capability(&self) -> Capability {
        self.chain.capability()
    }

    pub fn chain(&self) -> &ResolverChain {
        &self.chain
    }

    /// Resolve and validate. A rejected answer counts as that provider's
    /// failure and the chain resumes at the next provider.
    pub async fn run(&self, ctx: &ResolveContext) -> Result<StageOutcome, StageFailure> {
        let capability = self.capability();
        let mut cursor = ChainCursor::start();
        let mut attempts = Vec::new();

        loop {
            let resolution = match self.chain.resume(cursor, ctx, attempts).await {
                Ok(resolution) => resolution,
                Err(exhausted) => {
                    return Err(StageFailure {
                        outcome: StageOutcome {
                            capability,
                            attempts: exhausted.attempts.clone(),
                            artifact: None,
                        },
                        exhausted,
                    });
                }
            };

            match validate(resolution.artifact.clone(), &ctx.target, &self.limits).await {
                Ok(artifact) => {
                    return Ok(StageOutcome {
                        capability,
                        attempts: resolution.attempts,
                        artifact: Some(artifact),
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        capability = %capability,
                        provider = %resolution.artifact.provider,
                        error = %error,
                        "provider output rejected"
                    );
                    if let Some(media) = resolution.artifact.as_media().filter(|m| m.owned) {
                        if let Err(e) = tokio::fs::remove_file(&media.path).await {
                            tracing::debug!(
                                path = %media.path.display(),
                                error = %e,
                                "failed to remove rejected output"
                            );
                        }
                    }
                    (cursor, attempts) = resolution.reject(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainEntry;
    use crate::test_support::StubProvider;
    use shortforge_core::{MediaFile, MediaKind, Payload, ProviderError, RunId, TargetSpec};
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx() -> ResolveContext {
        ResolveContext::new(RunId::new(), "/tmp/ws", TargetSpec::default())
    }

    fn stage(providers: &[Arc<StubProvider>]) -> PipelineStage {
        let entries = providers
            .iter()
            .map(|p| ChainEntry::new(p.clone(), Duration::from_secs(5)))
            .collect();
        PipelineStage::new(
            ResolverChain::new(Capability::Prompt, entries).unwrap(),
            ValidationLimits::default(),
        )
    }

    #[tokio::test]
    async fn validation_failure_resumes_at_next_provider() {
        let empty = StubProvider::text("empty", "   ").shared();
        let good = StubProvider::text("good", "Quick life-hack to stay focused").shared();
        let stage = stage(&[empty.clone(), good.clone()]);

        let outcome = stage.run(&ctx()).await.unwrap();
        assert_eq!(outcome.resolved_by(), Some("good"));
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts[0].error().unwrap().is_validation());
        assert_eq!((empty.calls(), good.calls()), (1, 1));
    }

    #[tokio::test]
    async fn rejected_provider_is_not_retried_from_top() {
        let fail = StubProvider::failing("fail", Capability::Prompt).shared();
        let bad = StubProvider::text("bad", "").shared();
        let good = StubProvider::text("good", "ok").shared();
        let stage = stage(&[fail.clone(), bad.clone(), good.clone()]);

        let outcome = stage.run(&ctx()).await.unwrap();
        assert_eq!(outcome.resolved_by(), Some("good"));
        assert_eq!((fail.calls(), bad.calls(), good.calls()), (1, 1, 1));
        let names: Vec<_> = outcome.attempts.iter().map(|a| a.provider.as_str()).collect();
        assert_eq!(names, ["fail", "bad", "good"]);
    }

    #[tokio::test]
    async fn all_rejected_exhausts_stage() {
        let a = StubProvider::text("a", "").shared();
        let b = StubProvider::new("b", Capability::Prompt, |_| {
            Err(ProviderError::transport("connection reset"))
        })
        .shared();
        let stage = stage(&[a, b]);

        let failure = stage.run(&ctx()).await.unwrap_err();
        assert!(failure.outcome.artifact.is_none());
        assert_eq!(failure.exhausted.attempts.len(), 2);
        assert!(failure.exhausted.attempts[0].error().unwrap().is_validation());
        assert_eq!(failure.to_string(), "all 2 providers for prompt failed");
    }

    #[tokio::test]
    async fn accepted_artifact_is_normalized() {
        let quoted = StubProvider::new("q", Capability::Prompt, |_| {
            Ok(Payload::text("\"One motivational tip in 15 seconds\"\n"))
        })
        .shared();
        let outcome = stage(&[quoted]).run(&ctx()).await.unwrap();
        assert_eq!(
            outcome.artifact.unwrap().as_text(),
            Some("One motivational tip in 15 seconds")
        );
    }

    fn image(ctx: &ResolveContext, name: &str, (w, h): (u32, u32), owned: bool) -> Payload {
        let path = ctx.file(name);
        std::fs::write(&path, b"png").unwrap();
        Payload::Media(MediaFile {
            path,
            kind: MediaKind::Image,
            size: 3,
            width: Some(w),
            height: Some(h),
            duration: None,
            owned,
        })
    }

    #[tokio::test]
    async fn rejected_workspace_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ResolveContext::new(RunId::new(), dir.path(), TargetSpec::default());
        let banner = |owned| {
            move |ctx: &ResolveContext| -> Result<Payload, ProviderError> {
                let name = if owned { "generated.png" } else { "picked.png" };
                Ok(image(ctx, name, (4000, 100), owned))
            }
        };
        let providers = [
            StubProvider::new("generated", Capability::Visual, banner(true)).shared(),
            StubProvider::new("picked", Capability::Visual, banner(false)).shared(),
            StubProvider::new("portrait", Capability::Visual, |ctx| {
                Ok(image(ctx, "portrait.png", (720, 1280), true))
            })
            .shared(),
        ];
        let entries = providers
            .iter()
            .map(|p| ChainEntry::new(p.clone(), Duration::from_secs(5)))
            .collect();
        let stage = PipelineStage::new(
            ResolverChain::new(Capability::Visual, entries).unwrap(),
            ValidationLimits::default(),
        );

        let outcome = stage.run(&ctx).await.unwrap();
        assert_eq!(outcome.resolved_by(), Some("portrait"));
        assert!(!dir.path().join("generated.png").exists());
        assert!(dir.path().join("picked.png").exists());
        assert!(dir.path().join("portrait.png").exists());
    }
}
