//! shortforge-core: shared types, IDs, reports, and errors.
//!
//! This crate is the foundational dependency for the other shortforge crates.
//! It defines the pipeline [`Capability`] order, the immutable [`Artifact`]
//! handed between stages, the per-run [`RunReport`], and the error taxonomy
//! used by providers, stages and the job runner.

pub mod artifact;
pub mod capability;
pub mod error;
pub mod ids;
pub mod report;
pub mod target;

// Re-export the most commonly used items at the crate root.
pub use artifact::{Artifact, MediaFile, MediaKind, Payload, PublishReceipt};
pub use capability::Capability;
pub use error::{Error, ProviderError, PublishFailureKind, Result};
pub use ids::RunId;
pub use report::{
    AttemptOutcome, ChainExhausted, ProviderAttempt, RunFailure, RunReport, RunStatus,
    StageOutcome,
};
pub use target::TargetSpec;
