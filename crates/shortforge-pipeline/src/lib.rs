//! # shortforge-pipeline
//!
//! Multi-provider acquisition pipeline with ordered fallback.
//!
//! - **[`ProviderClient`]** -- uniform async interface to one provider.
//! - **[`ResolverChain`]** -- tries the providers of a capability in priority
//!   order, each bounded by a timeout, recording every attempt.
//! - **[`PipelineStage`]** -- a chain plus validation; rejected output moves
//!   on to the next provider.
//! - **[`CompositionProvider`]** / **[`PublishProvider`]** -- adapters that
//!   serve the composition and publish capabilities.
//! - **[`JobRunner`]** -- one full pass with cleanup on every exit path.
//! - **[`Scheduler`]** -- once or interval execution without overlap.

pub mod chain;
pub mod compose;
pub mod context;
pub mod provider;
pub mod publish;
pub mod runner;
pub mod scheduler;
pub mod stage;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use chain::{ChainCursor, ChainEntry, Resolution, ResolverChain};
pub use compose::CompositionProvider;
pub use context::ResolveContext;
pub use provider::ProviderClient;
pub use publish::{
    MetadataTemplate, PublishError, PublishMetadata, PublishProvider, Publisher, RetryPolicy,
    RetryingPublisher, Visibility,
};
pub use runner::{JobRunner, RunnerOptions, RunnerState};
pub use scheduler::{RunnableJob, ScheduleMode, Scheduler, SchedulerHandle, SchedulerSummary};
pub use stage::{PipelineStage, StageFailure};
pub use validate::ValidationLimits;
