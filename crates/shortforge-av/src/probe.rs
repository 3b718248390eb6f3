//! Media probing.
//!
//! [`RustProber`] reads still images (via `image`) and PCM WAV headers
//! without external tools. [`FfprobeProber`] shells out to `ffprobe` for
//! everything else. [`CompositeProber`] tries a list of probers in order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shortforge_core::{Error, MediaFile, MediaKind, Result};

use crate::audio::wav_duration;
use crate::command::ToolCommand;

/// Properties extracted from a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaProbe {
    pub kind: Option<MediaKind>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<Duration>,
}

/// A media file prober.
#[async_trait]
pub trait Prober: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this prober can handle the file. `true` does not guarantee
    /// that [`Prober::probe`] succeeds.
    fn supports(&self, path: &Path) -> bool;

    async fn probe(&self, path: &Path) -> Result<MediaProbe>;
}

/// Probe `path` and describe it as a [`MediaFile`].
///
/// The kind falls back to the file extension when the prober cannot tell.
pub async fn probe_media_file(prober: &dyn Prober, path: &Path, owned: bool) -> Result<MediaFile> {
    let size = tokio::fs::metadata(path).await?.len();
    let info = prober.probe(path).await?;
    let kind = info
        .kind
        .or_else(|| MediaKind::from_extension(path))
        .ok_or_else(|| Error::Probe(format!("unknown media kind: {}", path.display())))?;

    Ok(MediaFile {
        path: path.to_path_buf(),
        kind,
        size,
        width: info.width,
        height: info.height,
        duration: info.duration,
        owned,
    })
}

// ---------------------------------------------------------------------------
// Pure Rust
// ---------------------------------------------------------------------------

/// Probes still images and WAV files in-process.
#[derive(Debug, Clone, Default)]
pub struct RustProber;

impl RustProber {
    pub fn new() -> Self {
        Self
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

#[async_trait]
impl Prober for RustProber {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn supports(&self, path: &Path) -> bool {
        is_wav(path) || MediaKind::from_extension(path) == Some(MediaKind::Image)
    }

    async fn probe(&self, path: &Path) -> Result<MediaProbe> {
        let owned = path.to_path_buf();
        let wav = is_wav(path);

        tokio::task::spawn_blocking(move || -> Result<MediaProbe> {
            if wav {
                let duration = wav_duration(&owned)?
                    .ok_or_else(|| Error::Probe(format!("not a PCM WAV file: {}", owned.display())))?;
                Ok(MediaProbe {
                    kind: Some(MediaKind::Audio),
                    duration: Some(duration),
                    ..Default::default()
                })
            } else {
                let (width, height) = image::image_dimensions(&owned)
                    .map_err(|e| Error::Probe(format!("{}: {e}", owned.display())))?;
                Ok(MediaProbe {
                    kind: Some(MediaKind::Image),
                    width: Some(width),
                    height: Some(height),
                    duration: None,
                })
            }
        })
        .await
        .map_err(|e| Error::Internal(format!("probe task failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// ffprobe
// ---------------------------------------------------------------------------

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some()
    }

    async fn probe(&self, path: &Path) -> Result<MediaProbe> {
        let output = ToolCommand::new(self.ffprobe_path.clone())
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .path_arg(path)
            .timeout(self.timeout)
            .execute()
            .await?;

        parse_ffprobe_json(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

fn parse_secs(s: Option<&str>) -> Option<Duration> {
    s.and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Map `ffprobe -show_format -show_streams` JSON to a [`MediaProbe`].
///
/// For videos the video stream's duration is preferred over the container's,
/// which also covers audio priming.
pub fn parse_ffprobe_json(json: &str) -> Result<MediaProbe> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let format_name = output.format.format_name.as_deref().unwrap_or("");
    let is_still = format_name.contains("image2")
        || format_name.ends_with("_pipe")
        || format_name == "gif";

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let container_duration = parse_secs(output.format.duration.as_deref());

    let probe = match video {
        Some(v) if is_still => MediaProbe {
            kind: Some(MediaKind::Image),
            width: v.width,
            height: v.height,
            duration: None,
        },
        Some(v) => MediaProbe {
            kind: Some(MediaKind::Video),
            width: v.width,
            height: v.height,
            duration: parse_secs(v.duration.as_deref()).or(container_duration),
        },
        None if has_audio => MediaProbe {
            kind: Some(MediaKind::Audio),
            width: None,
            height: None,
            duration: container_duration,
        },
        None => return Err(Error::Probe("no audio or video streams".into())),
    };

    Ok(probe)
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// Tries each registered [`Prober`] in order and returns the first success.
pub struct CompositeProber {
    probers: Vec<Box<dyn Prober>>,
}

impl CompositeProber {
    pub fn new(probers: Vec<Box<dyn Prober>>) -> Self {
        Self { probers }
    }
}

#[async_trait]
impl Prober for CompositeProber {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn supports(&self, path: &Path) -> bool {
        self.probers.iter().any(|p| p.supports(path))
    }

    async fn probe(&self, path: &Path) -> Result<MediaProbe> {
        let mut last_err = None;

        for prober in &self.probers {
            if !prober.supports(path) {
                continue;
            }

            match prober.probe(path).await {
                Ok(info) => return Ok(info),
                Err(e) => {
                    tracing::debug!(
                        prober = prober.name(),
                        error = %e,
                        "prober failed, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::Probe(format!("no prober supports file: {}", path.display()))
        }))
    }
}
