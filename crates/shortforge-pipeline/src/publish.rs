//! Publishing: metadata, the [`Publisher`] trait, bounded retry of transient
//! failures, and the provider adapter for the publish stage.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shortforge_core::{
    Capability, MediaFile, Payload, ProviderError, PublishFailureKind, PublishReceipt,
};

use crate::context::ResolveContext;
use crate::provider::ProviderClient;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static parts of the publish metadata (`[publish]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataTemplate {
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub category_id: String,
    pub title_max_chars: usize,
    pub made_for_kids: bool,
}

impl Default for MetadataTemplate {
    fn default() -> Self {
        Self {
            visibility: Visibility::Public,
            tags: vec!["AI".into(), "shorts".into()],
            category_id: "22".into(),
            title_max_chars: 55,
            made_for_kids: false,
        }
    }
}

/// Everything the hosting platform needs besides the media itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub visibility: Visibility,
    pub made_for_kids: bool,
}

impl PublishMetadata {
    /// Build metadata for a prompt.
    ///
    /// The title is the prompt cut to `title_max_chars` followed by ` #NNNNN`,
    /// the last five digits of the unix timestamp, so repeated prompts still
    /// get distinct titles.
    pub fn from_prompt(prompt: &str, template: &MetadataTemplate, now: DateTime<Utc>) -> Self {
        let head: String = prompt.trim().chars().take(template.title_max_chars).collect();
        let suffix = now.timestamp().rem_euclid(100_000);
        let title = format!("{} #{suffix:05}", head.trim());

        let mut description = format!("Auto-generated AI Short. Prompt: {}", prompt.trim());
        if !template.tags.is_empty() {
            let hashtags: Vec<String> = template
                .tags
                .iter()
                .map(|t| format!("#{}", t.trim_start_matches('#').replace(' ', "")))
                .collect();
            description.push_str("\n\n");
            description.push_str(&hashtags.join(" "));
        }

        Self {
            title,
            description,
            tags: template.tags.clone(),
            category_id: template.category_id.clone(),
            visibility: template.visibility,
            made_for_kids: template.made_for_kids,
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} publish failure: {message}")]
pub struct PublishError {
    pub kind: PublishFailureKind,
    pub message: String,
}

impl PublishError {
    /// Rate limiting, 5xx, network errors: worth retrying.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: PublishFailureKind::Transient,
            message: message.into(),
        }
    }

    /// Auth, quota, invalid request: surfaced immediately.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: PublishFailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == PublishFailureKind::Transient
    }
}

impl From<PublishError> for ProviderError {
    fn from(err: PublishError) -> Self {
        ProviderError::publish(err.kind, err.message)
    }
}

/// Uploads a composed short to a hosting platform.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(
        &self,
        media: &MediaFile,
        metadata: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError>;
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Bounded exponential backoff for transient publish failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, after `attempt` failures.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Retries transient failures of the wrapped publisher; exhausting the
/// bound turns the last transient failure into a permanent one.
pub struct RetryingPublisher {
    inner: Arc<dyn Publisher>,
    policy: RetryPolicy,
}

impl RetryingPublisher {
    pub fn new(inner: Arc<dyn Publisher>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Publisher for RetryingPublisher {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn publish(
        &self,
        media: &MediaFile,
        metadata: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.publish(media, metadata).await {
                Ok(receipt) => return Ok(receipt),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        publisher = self.inner.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "transient publish failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    return Err(PublishError::permanent(format!(
                        "gave up after {max_attempts} attempts: {}",
                        err.message
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stage adapter
// ---------------------------------------------------------------------------

/// Serves the publish capability with a [`Publisher`].
pub struct PublishProvider {
    name: String,
    publisher: Arc<dyn Publisher>,
    template: MetadataTemplate,
}

impl PublishProvider {
    pub fn new(
        name: impl Into<String>,
        publisher: Arc<dyn Publisher>,
        template: MetadataTemplate,
    ) -> Self {
        Self {
            name: name.into(),
            publisher,
            template,
        }
    }
}

#[async_trait]
impl ProviderClient for PublishProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Publish
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        let media = ctx
            .composition()
            .ok_or_else(|| ProviderError::unavailable("no composed media to publish"))?;
        let prompt = ctx.prompt().unwrap_or_default();
        let metadata = PublishMetadata::from_prompt(prompt, &self.template, Utc::now());

        tracing::info!(
            publisher = self.publisher.name(),
            title = %metadata.title,
            visibility = %metadata.visibility,
            "publishing short"
        );

        let receipt = self.publisher.publish(media, &metadata).await?;
        Ok(Payload::Published(receipt))
    }
}
