//! Stage artifacts: the immutable outputs handed from one stage to the next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capability::Capability;

/// Broad media classification for file payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Guess the kind from a file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "gif" => Some(Self::Image),
            "mp4" | "mov" | "webm" | "mkv" | "m4v" => Some(Self::Video),
            "mp3" | "wav" | "m4a" | "aac" | "ogg" | "flac" | "opus" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// A reference to a media file on disk together with its probed properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
    /// File size in bytes.
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default, with = "opt_duration_secs")]
    pub duration: Option<Duration>,
    /// `true` when the file lives in the run workspace and is deleted with it.
    /// Local assets picked from user directories are never owned.
    pub owned: bool,
}

impl MediaFile {
    /// Width and height, when both are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Platform-assigned identifier.
    pub id: String,
    pub url: Option<String>,
}

/// Opaque stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text { text: String },
    Media(MediaFile),
    Published(PublishReceipt),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text { text: text.into() }
    }
}

/// The validated output of one pipeline stage.
///
/// Artifacts are never mutated after creation; a stage that needs different
/// dimensions or duration produces a new artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub capability: Capability,
    pub payload: Payload,
    /// Name of the provider that produced this artifact.
    pub provider: String,
    pub acquired_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(capability: Capability, payload: Payload, provider: impl Into<String>) -> Self {
        Self {
            capability,
            payload,
            provider: provider.into(),
            acquired_at: Utc::now(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaFile> {
        match &self.payload {
            Payload::Media(media) => Some(media),
            _ => None,
        }
    }

    pub fn as_receipt(&self) -> Option<&PublishReceipt> {
        match &self.payload {
            Payload::Published(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// One-line description used in log output.
    pub fn summary(&self) -> String {
        match &self.payload {
            Payload::Text { text } => format!("text ({} chars)", text.chars().count()),
            Payload::Media(m) => {
                let mut s = format!("{:?} {}", m.kind, m.path.display());
                if let Some((w, h)) = m.dimensions() {
                    s.push_str(&format!(" {}x{}", w, h));
                }
                if let Some(d) = m.duration {
                    s.push_str(&format!(" {:.2}s", d.as_secs_f64()));
                }
                s
            }
            Payload::Published(r) => format!("published id={}", r.id),
        }
    }
}

/// Serde helpers to (de)serialize `Option<Duration>` as fractional seconds.
mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs.filter(|s| s.is_finite() && *s >= 0.0).map(Duration::from_secs_f64))
    }
}
