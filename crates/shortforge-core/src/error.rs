//! Error types for shortforge.
//!
//! [`Error`] covers configuration, tooling and I/O failures of the library
//! crates. [`ProviderError`] describes why a single provider attempt failed;
//! it is cloneable and serializable because every attempt is kept in the
//! run report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Maximum number of characters of a response body kept in an error.
const MAX_BODY_CHARS: usize = 200;

/// Unified error type for the library crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration is invalid; fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe, yt-dlp) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool { tool: String, message: String },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// A pipeline step failed.
    #[error("Pipeline error [{step}]: {message}")]
    Pipeline { step: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn pipeline(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            step: step.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Whether a publish failure may succeed if retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishFailureKind {
    Transient,
    Permanent,
}

impl fmt::Display for PublishFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// Why one provider attempt failed.
///
/// Every variant advances the resolver chain to the next provider; the
/// variant only matters for diagnosis and for the run-level failure class.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider is not configured (missing key, empty directory, ...).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The provider answered, but its output failed stage validation.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("composition failed: {0}")]
    Composition(String),

    #[error("publish failed ({kind}): {message}")]
    Publish {
        kind: PublishFailureKind,
        message: String,
    },
}

impl ProviderError {
    pub fn transport(err: impl fmt::Display) -> Self {
        ProviderError::Transport(err.to_string())
    }

    pub fn timeout(timeout: Duration) -> Self {
        ProviderError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Non-success HTTP status with the (truncated) response body.
    pub fn status(status: u16, body: &str) -> Self {
        ProviderError::Status {
            status,
            body: body.chars().take(MAX_BODY_CHARS).collect(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ProviderError::Unavailable(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        ProviderError::Validation(reason.into())
    }

    pub fn composition(reason: impl fmt::Display) -> Self {
        ProviderError::Composition(reason.to_string())
    }

    pub fn publish(kind: PublishFailureKind, message: impl Into<String>) -> Self {
        ProviderError::Publish {
            kind,
            message: message.into(),
        }
    }

    /// Diagnostic class: `transport`, `validation`, `composition` or `publish`.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Transport(_)
            | Self::Timeout { .. }
            | Self::Status { .. }
            | Self::Unavailable(_)
            | Self::Io(_) => "transport",
            Self::Validation(_) => "validation",
            Self::Composition(_) => "composition",
            Self::Publish { .. } => "publish",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Io(err.to_string())
    }
}

impl From<Error> for ProviderError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io { source } => ProviderError::Io(source.to_string()),
            Error::Config(msg) => ProviderError::Unavailable(msg),
            other => ProviderError::Transport(other.to_string()),
        }
    }
}
