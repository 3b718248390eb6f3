//! Pipeline capabilities and their fixed execution order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One stage's category of responsibility.
///
/// The declaration order is the pipeline order: a run never attempts a
/// capability whose predecessor failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Prompt,
    Visual,
    Audio,
    Composition,
    Publish,
}

impl Capability {
    /// All capabilities in pipeline order.
    pub const ALL: [Capability; 5] = [
        Capability::Prompt,
        Capability::Visual,
        Capability::Audio,
        Capability::Composition,
        Capability::Publish,
    ];

    /// Lowercase identifier used in configuration and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Visual => "visual",
            Self::Audio => "audio",
            Self::Composition => "composition",
            Self::Publish => "publish",
        }
    }

    /// Zero-based position in the pipeline.
    pub fn position(&self) -> usize {
        *self as usize
    }

    /// The capability that must succeed before this one runs.
    pub fn predecessor(&self) -> Option<Capability> {
        match self.position() {
            0 => None,
            n => Some(Self::ALL[n - 1]),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prompt" => Ok(Self::Prompt),
            "visual" | "image" | "video" => Ok(Self::Visual),
            "audio" | "music" => Ok(Self::Audio),
            "composition" | "compose" => Ok(Self::Composition),
            "publish" | "upload" => Ok(Self::Publish),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}
