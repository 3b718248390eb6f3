//! Ordered fallback across the providers of one capability.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shortforge_core::{
    Artifact, Capability, ChainExhausted, Error, ProviderAttempt, ProviderError, Result,
};

use crate::context::ResolveContext;
use crate::provider::ProviderClient;

/// A provider together with its per-call timeout.
#[derive(Clone)]
pub struct ChainEntry {
    pub client: Arc<dyn ProviderClient>,
    pub timeout: Duration,
}

impl ChainEntry {
    pub fn new(client: Arc<dyn ProviderClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl std::fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEntry")
            .field("provider", &self.client.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Position of the next provider to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainCursor(usize);

impl ChainCursor {
    pub fn start() -> Self {
        Self(0)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// A provider's answer, not yet accepted by stage validation.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub artifact: Artifact,
    /// Cursor pointing after the provider that produced `artifact`.
    pub next: ChainCursor,
    /// Every attempt so far, the last one being the success.
    pub attempts: Vec<ProviderAttempt>,
}

impl Resolution {
    /// Turn the successful attempt into a failure (the output did not pass
    /// validation) and hand back what is needed to resume the chain.
    pub fn reject(mut self, error: ProviderError) -> (ChainCursor, Vec<ProviderAttempt>) {
        let elapsed = self
            .attempts
            .pop()
            .map(|a| Duration::from_millis(a.elapsed_ms))
            .unwrap_or_default();
        self.attempts
            .push(ProviderAttempt::failed(&self.artifact.provider, error, elapsed));
        (self.next, self.attempts)
    }
}

/// Tries the providers of one capability strictly in priority order.
///
/// Built once at startup and shared read-only across runs.
#[derive(Debug, Clone)]
pub struct ResolverChain {
    capability: Capability,
    entries: Vec<ChainEntry>,
}

impl ResolverChain {
    /// Build a chain from entries already sorted by priority.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the list is empty, mixes capabilities,
    /// repeats a provider name, or has a terminal provider before the end.
    pub fn new(capability: Capability, entries: Vec<ChainEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::config(format!("no providers configured for {capability}")));
        }

        let last = entries.len() - 1;
        for (i, entry) in entries.iter().enumerate() {
            let name = entry.client.name();
            if entry.client.capability() != capability {
                return Err(Error::config(format!(
                    "provider '{name}' serves {}, not {capability}",
                    entry.client.capability()
                )));
            }
            if entry.client.is_terminal() && i != last {
                return Err(Error::config(format!(
                    "terminal provider '{name}' must be last in the {capability} chain"
                )));
            }
            if entries[..i].iter().any(|e| e.client.name() == name) {
                return Err(Error::config(format!(
                    "provider '{name}' appears twice in the {capability} chain"
                )));
            }
        }

        Ok(Self {
            capability,
            entries,
        })
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.client.name()).collect()
    }

    /// Try every provider from the top.
    pub async fn resolve(
        &self,
        ctx: &ResolveContext,
    ) -> std::result::Result<Resolution, ChainExhausted> {
        self.resume(ChainCursor::start(), ctx, Vec::new()).await
    }

    /// Continue from `cursor`, appending to the attempts already made.
    pub async fn resume(
        &self,
        cursor: ChainCursor,
        ctx: &ResolveContext,
        mut attempts: Vec<ProviderAttempt>,
    ) -> std::result::Result<Resolution, ChainExhausted> {
        for (index, entry) in self.entries.iter().enumerate().skip(cursor.index()) {
            let name = entry.client.name();
            let started = Instant::now();

            let result = match tokio::time::timeout(entry.timeout, entry.client.invoke(ctx)).await
            {
                Ok(result) => result,
                Err(_elapsed) => Err(ProviderError::timeout(entry.timeout)),
            };
            let elapsed = started.elapsed();

            match result {
                Ok(payload) => {
                    tracing::debug!(
                        capability = %self.capability,
                        provider = name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "provider returned output"
                    );
                    attempts.push(ProviderAttempt::succeeded(name, elapsed));
                    return Ok(Resolution {
                        artifact: Artifact::new(self.capability, payload, name),
                        next: ChainCursor(index + 1),
                        attempts,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        capability = %self.capability,
                        provider = name,
                        class = error.class(),
                        error = %error,
                        "provider failed, trying next"
                    );
                    attempts.push(ProviderAttempt::failed(name, error, elapsed));
                }
            }
        }

        Err(ChainExhausted {
            capability: self.capability,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubProvider;
    use shortforge_core::{Payload, RunId, TargetSpec};

    fn ctx() -> ResolveContext {
        ResolveContext::new(RunId::new(), "/tmp/ws", TargetSpec::default())
    }

    fn entry(p: &Arc<StubProvider>) -> ChainEntry {
        ChainEntry::new(p.clone(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn first_success_wins_and_later_providers_are_not_called() {
        let a = StubProvider::failing("a", Capability::Prompt).shared();
        let b = StubProvider::text("b", "hello").shared();
        let c = StubProvider::text("c", "never").shared();
        let chain =
            ResolverChain::new(Capability::Prompt, vec![entry(&a), entry(&b), entry(&c)]).unwrap();

        let resolution = chain.resolve(&ctx()).await.unwrap();
        assert_eq!(resolution.artifact.provider, "b");
        assert_eq!(resolution.artifact.as_text(), Some("hello"));
        assert_eq!(resolution.next.index(), 2);
        assert_eq!(resolution.attempts.len(), 2);
        assert!(!resolution.attempts[0].is_success());
        assert!(resolution.attempts[1].is_success());
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn exhaustion_lists_every_provider_once_in_order() {
        let a = StubProvider::failing("a", Capability::Visual).shared();
        let b = StubProvider::failing("b", Capability::Visual).shared();
        let chain = ResolverChain::new(Capability::Visual, vec![entry(&a), entry(&b)]).unwrap();

        let err = chain.resolve(&ctx()).await.unwrap_err();
        assert_eq!(err.capability, Capability::Visual);
        let names: Vec<_> = err.attempts.iter().map(|a| a.provider.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure() {
        let slow = StubProvider::text("slow", "late")
            .delayed(Duration::from_secs(120))
            .shared();
        let fast = StubProvider::text("fast", "on time").shared();
        let chain = ResolverChain::new(
            Capability::Prompt,
            vec![
                ChainEntry::new(slow.clone(), Duration::from_secs(1)),
                entry(&fast),
            ],
        )
        .unwrap();

        let resolution = chain.resolve(&ctx()).await.unwrap();
        assert_eq!(resolution.artifact.provider, "fast");
        assert_eq!(
            resolution.attempts[0].error(),
            Some(&ProviderError::timeout(Duration::from_secs(1)))
        );
    }

    #[tokio::test]
    async fn reject_then_resume_continues_after_rejected_provider() {
        let a = StubProvider::text("a", "bad").shared();
        let b = StubProvider::text("b", "good").shared();
        let chain = ResolverChain::new(Capability::Prompt, vec![entry(&a), entry(&b)]).unwrap();
        let ctx = ctx();

        let first = chain.resolve(&ctx).await.unwrap();
        let (cursor, attempts) = first.reject(ProviderError::validation("too long"));
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].error().unwrap().is_validation());

        let second = chain.resume(cursor, &ctx, attempts).await.unwrap();
        assert_eq!(second.artifact.provider, "b");
        assert_eq!(second.attempts.len(), 2);
        assert_eq!(a.calls(), 1);
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(ResolverChain::new(Capability::Audio, vec![]).is_err());
    }

    #[test]
    fn capability_mismatch_is_rejected() {
        let p = StubProvider::text("prompt", "x").shared();
        let err = ResolverChain::new(Capability::Visual, vec![entry(&p)]).unwrap_err();
        assert!(err.to_string().contains("serves prompt"));
    }

    #[test]
    fn terminal_must_be_last() {
        let t = StubProvider::text("static", "x").terminal().shared();
        let p = StubProvider::text("gemini", "y").shared();
        let err = ResolverChain::new(Capability::Prompt, vec![entry(&t), entry(&p)]).unwrap_err();
        assert!(err.to_string().contains("must be last"));

        assert!(ResolverChain::new(Capability::Prompt, vec![entry(&p), entry(&t)]).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let a = StubProvider::text("same", "x").shared();
        let b = StubProvider::text("same", "y").shared();
        assert!(ResolverChain::new(Capability::Prompt, vec![entry(&a), entry(&b)]).is_err());
    }

    #[tokio::test]
    async fn payload_is_wrapped_with_capability() {
        let p = StubProvider::new("rcpt", Capability::Publish, |_| {
            Ok(Payload::Published(shortforge_core::PublishReceipt {
                id: "abc".into(),
                url: None,
            }))
        })
        .shared();
        let chain = ResolverChain::new(Capability::Publish, vec![entry(&p)]).unwrap();
        let resolution = chain.resolve(&ctx()).await.unwrap();
        assert_eq!(resolution.artifact.capability, Capability::Publish);
        assert_eq!(resolution.artifact.as_receipt().unwrap().id, "abc");
    }
}
