//! Composition of a visual and an audio track into the final short.
//!
//! [`FfmpegCompositor`] encodes into `<name>.partial.mp4` next to the
//! requested output and renames it only after the result has been probed and
//! matches the target. Any failure removes the partial file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shortforge_core::{Error, MediaFile, MediaKind, Result, TargetSpec};

use crate::frame::prepare_frame;
use crate::probe::Prober;
use crate::tools::ToolConfig;

/// Inputs for one composition.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub visual: MediaFile,
    pub audio: Option<MediaFile>,
    pub target: TargetSpec,
    /// Final output path; must end in `.mp4`.
    pub output: PathBuf,
}

/// Produces a single media file from a visual and an optional audio track.
#[async_trait]
pub trait Compositor: Send + Sync {
    fn name(&self) -> &str;

    async fn compose(&self, request: &CompositionRequest) -> Result<MediaFile>;
}

/// Temporary path used while encoding `output`.
pub fn partial_path(output: &Path) -> PathBuf {
    output.with_extension("partial.mp4")
}

/// x264 settings for the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub preset: String,
    pub crf: u8,
    pub audio_bitrate: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            preset: "veryfast".into(),
            crf: 23,
            audio_bitrate: "192k".into(),
        }
    }
}

/// Build the ffmpeg argument list.
///
/// Still images are expected to be pre-cropped to the target resolution and
/// are looped for the target duration. Videos are looped, scaled to cover the
/// target and center-cropped.
pub fn ffmpeg_args(
    visual: &Path,
    visual_kind: MediaKind,
    audio: Option<&Path>,
    target: &TargetSpec,
    settings: &EncodeSettings,
    dest: &Path,
) -> Vec<String> {
    let (w, h, fps) = (target.width, target.height, target.fps);
    let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let filter = match visual_kind {
        MediaKind::Video => {
            args.extend(["-stream_loop".into(), "-1".into()]);
            format!(
                "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps},format=yuv420p"
            )
        }
        _ => {
            args.extend(["-loop".into(), "1".into(), "-framerate".into(), fps.to_string()]);
            format!("setsar=1,fps={fps},format=yuv420p")
        }
    };
    args.extend(["-i".into(), visual.to_string_lossy().into_owned()]);

    if let Some(audio) = audio {
        args.extend(["-i".into(), audio.to_string_lossy().into_owned()]);
    }

    args.extend(["-vf".into(), filter, "-map".into(), "0:v:0".into()]);

    match audio {
        Some(_) => args.extend([
            "-map".into(),
            "1:a:0".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            settings.audio_bitrate.clone(),
        ]),
        None => args.push("-an".into()),
    }

    args.extend([
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        settings.preset.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-r".into(),
        fps.to_string(),
        "-t".into(),
        format!("{:.3}", target.duration.as_secs_f64()),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
        dest.to_string_lossy().into_owned(),
    ]);

    args
}

/// ffmpeg-backed [`Compositor`].
pub struct FfmpegCompositor {
    ffmpeg: ToolConfig,
    prober: Arc<dyn Prober>,
    settings: EncodeSettings,
}

impl FfmpegCompositor {
    pub fn new(ffmpeg: ToolConfig, prober: Arc<dyn Prober>) -> Self {
        Self {
            ffmpeg,
            prober,
            settings: EncodeSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EncodeSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn encode(&self, request: &CompositionRequest, partial: &Path) -> Result<MediaFile> {
        let target = request.target;
        let mut frame_path = None;

        let visual_input = match request.visual.kind {
            MediaKind::Image => {
                let frame = request.output.with_extension("frame.png");
                let (src, dst) = (request.visual.path.clone(), frame.clone());
                tokio::task::spawn_blocking(move || prepare_frame(&src, &dst, &target))
                    .await
                    .map_err(|e| Error::Internal(format!("frame task failed: {e}")))??;
                frame_path = Some(frame.clone());
                frame
            }
            MediaKind::Video => request.visual.path.clone(),
            MediaKind::Audio => {
                return Err(Error::pipeline("composition", "visual input is an audio file"));
            }
        };

        let args = ffmpeg_args(
            &visual_input,
            request.visual.kind,
            request.audio.as_ref().map(|a| a.path.as_path()),
            &target,
            &self.settings,
            partial,
        );

        tracing::info!(
            visual = %request.visual.path.display(),
            audio = ?request.audio.as_ref().map(|a| a.path.display().to_string()),
            width = target.width,
            height = target.height,
            duration_secs = target.duration.as_secs_f64(),
            "composing short"
        );

        let result = self.ffmpeg.command().args(args).execute().await;
        if let Some(frame) = frame_path {
            let _ = tokio::fs::remove_file(frame).await;
        }
        result?;

        let probed = self.prober.probe(partial).await?;
        check_output(probed.width, probed.height, probed.duration, &target)?;

        tokio::fs::rename(partial, &request.output).await?;
        let size = tokio::fs::metadata(&request.output).await?.len();

        Ok(MediaFile {
            path: request.output.clone(),
            kind: MediaKind::Video,
            size,
            width: Some(target.width),
            height: Some(target.height),
            duration: Some(target.duration),
            owned: true,
        })
    }
}

/// Verify encoded dimensions and that the duration is within half a frame
/// of the target.
fn check_output(
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<Duration>,
    target: &TargetSpec,
) -> Result<()> {
    if (width, height) != (Some(target.width), Some(target.height)) {
        return Err(Error::pipeline(
            "composition",
            format!(
                "output is {:?}x{:?}, expected {}x{}",
                width, height, target.width, target.height
            ),
        ));
    }

    let duration =
        duration.ok_or_else(|| Error::pipeline("composition", "output duration unknown"))?;
    let tolerance = target.frame_duration() / 2;
    let delta = if duration > target.duration {
        duration - target.duration
    } else {
        target.duration - duration
    };
    if delta > tolerance {
        return Err(Error::pipeline(
            "composition",
            format!(
                "output lasts {:.3}s, expected {:.3}s",
                duration.as_secs_f64(),
                target.duration.as_secs_f64()
            ),
        ));
    }
    Ok(())
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn compose(&self, request: &CompositionRequest) -> Result<MediaFile> {
        let partial = partial_path(&request.output);
        match self.encode(request, &partial).await {
            Ok(file) => Ok(file),
            Err(e) => {
                if tokio::fs::remove_file(&partial).await.is_ok() {
                    tracing::debug!(path = %partial.display(), "removed partial output");
                }
                Err(e)
            }
        }
    }
}
