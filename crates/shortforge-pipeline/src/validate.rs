//! Stage validation of provider output.
//!
//! A provider that answers with semantically wrong output (an empty prompt, a
//! zero-byte image, a track shorter than the short) fails here and the chain
//! moves on to the next provider.

use serde::{Deserialize, Serialize};
use shortforge_core::{
    Artifact, Capability, MediaFile, MediaKind, Payload, ProviderError, TargetSpec,
};

/// Configurable validation bounds (`[limits]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationLimits {
    pub prompt_max_chars: usize,
    /// Minimum fraction of a visual's area kept by the center crop to the
    /// target aspect ratio.
    pub min_crop_keep: f64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            prompt_max_chars: 200,
            min_crop_keep: 0.25,
        }
    }
}

type Validation = Result<Artifact, ProviderError>;

/// Validate an artifact for its capability, returning the accepted (possibly
/// normalized) artifact.
pub async fn validate(artifact: Artifact, target: &TargetSpec, limits: &ValidationLimits) -> Validation {
    match artifact.capability {
        Capability::Prompt => validate_prompt(artifact, limits),
        Capability::Visual => {
            let media = expect_media(&artifact)?;
            check_file(media).await?;
            check_visual(media, target, limits)?;
            Ok(artifact)
        }
        Capability::Audio => {
            let media = expect_media(&artifact)?;
            check_file(media).await?;
            check_audio(media, target)?;
            Ok(artifact)
        }
        Capability::Composition => {
            let media = expect_media(&artifact)?;
            check_file(media).await?;
            check_composition(media, target)?;
            Ok(artifact)
        }
        Capability::Publish => match &artifact.payload {
            Payload::Published(receipt) if !receipt.id.trim().is_empty() => Ok(artifact),
            Payload::Published(_) => Err(ProviderError::validation("empty publish id")),
            _ => Err(ProviderError::validation("expected a publish receipt")),
        },
    }
}

/// Strip surrounding whitespace and one layer of wrapping quotes.
pub fn normalize_prompt(text: &str) -> &str {
    let trimmed = text.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    trimmed
}

fn validate_prompt(artifact: Artifact, limits: &ValidationLimits) -> Validation {
    let text = artifact
        .as_text()
        .ok_or_else(|| ProviderError::validation("expected text"))?;
    let normalized = normalize_prompt(text).to_string();

    if normalized.is_empty() {
        return Err(ProviderError::validation("empty prompt"));
    }
    let chars = normalized.chars().count();
    if chars > limits.prompt_max_chars {
        return Err(ProviderError::validation(format!(
            "prompt has {chars} characters, limit is {}",
            limits.prompt_max_chars
        )));
    }

    if normalized == text {
        return Ok(artifact);
    }
    Ok(Artifact {
        payload: Payload::text(normalized),
        ..artifact
    })
}

fn expect_media(artifact: &Artifact) -> Result<&MediaFile, ProviderError> {
    artifact
        .as_media()
        .ok_or_else(|| ProviderError::validation("expected a media file"))
}

async fn check_file(media: &MediaFile) -> Result<(), ProviderError> {
    let meta = tokio::fs::metadata(&media.path).await.map_err(|e| {
        ProviderError::validation(format!("{} is not readable: {e}", media.path.display()))
    })?;
    if !meta.is_file() || meta.len() == 0 {
        return Err(ProviderError::validation(format!(
            "{} is empty",
            media.path.display()
        )));
    }
    Ok(())
}

fn check_visual(
    media: &MediaFile,
    target: &TargetSpec,
    limits: &ValidationLimits,
) -> Result<(), ProviderError> {
    if !matches!(media.kind, MediaKind::Image | MediaKind::Video) {
        return Err(ProviderError::validation("visual must be an image or a video"));
    }
    if let Some((w, h)) = media.dimensions() {
        if w == 0 || h == 0 {
            return Err(ProviderError::validation(format!("degenerate size {w}x{h}")));
        }
        let keep = target.crop_keep_ratio(w, h);
        if keep < limits.min_crop_keep {
            return Err(ProviderError::validation(format!(
                "{w}x{h} keeps {:.0}% after cropping to {}x{}, minimum is {:.0}%",
                keep * 100.0,
                target.width,
                target.height,
                limits.min_crop_keep * 100.0
            )));
        }
    }
    Ok(())
}

fn check_audio(media: &MediaFile, target: &TargetSpec) -> Result<(), ProviderError> {
    if media.kind != MediaKind::Audio {
        return Err(ProviderError::validation("expected an audio file"));
    }
    match media.duration {
        Some(d) if d >= target.duration => Ok(()),
        Some(d) => Err(ProviderError::validation(format!(
            "track lasts {:.2}s, need {:.2}s",
            d.as_secs_f64(),
            target.duration.as_secs_f64()
        ))),
        None => Err(ProviderError::validation("audio duration unknown")),
    }
}

fn check_composition(media: &MediaFile, target: &TargetSpec) -> Result<(), ProviderError> {
    if media.kind != MediaKind::Video {
        return Err(ProviderError::validation("composition must be a video"));
    }
    if media.duration != Some(target.duration) {
        return Err(ProviderError::validation(format!(
            "composition lasts {:?}, expected {:?}",
            media.duration, target.duration
        )));
    }
    if media.dimensions() != Some((target.width, target.height)) {
        return Err(ProviderError::validation(format!(
            "composition is {:?}, expected {}x{}",
            media.dimensions(),
            target.width,
            target.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    fn media(path: &Path, kind: MediaKind) -> MediaFile {
        MediaFile {
            path: path.to_path_buf(),
            kind,
            size: 4,
            width: None,
            height: None,
            duration: None,
            owned: true,
        }
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn prompt_normalization() {
        assert_eq!(normalize_prompt("  \"Never give up!\"\n"), "Never give up!");
        assert_eq!(normalize_prompt("'x'"), "x");
        assert_eq!(normalize_prompt("plain"), "plain");
        assert_eq!(normalize_prompt("\"unbalanced"), "\"unbalanced");
    }

    #[tokio::test]
    async fn prompt_rules() {
        let t = TargetSpec::default();
        let limits = ValidationLimits {
            prompt_max_chars: 10,
            ..Default::default()
        };
        let art = |s: &str| Artifact::new(Capability::Prompt, Payload::text(s), "p");

        let ok = validate(art(" \"short\" "), &t, &limits).await.unwrap();
        assert_eq!(ok.as_text(), Some("short"));
        assert_eq!(ok.provider, "p");

        assert!(validate(art("   "), &t, &limits).await.is_err());
        assert!(validate(art("\"\""), &t, &limits).await.is_err());
        assert!(validate(art("this one is too long"), &t, &limits).await.is_err());
    }

    #[tokio::test]
    async fn visual_rules() {
        let dir = tempfile::tempdir().unwrap();
        let t = TargetSpec::default();
        let limits = ValidationLimits::default();

        let path = write(dir.path(), "v.png", b"data");
        let mut m = media(&path, MediaKind::Image);
        m.width = Some(720);
        m.height = Some(1280);
        let art = |m: MediaFile| Artifact::new(Capability::Visual, Payload::Media(m), "v");
        assert!(validate(art(m.clone()), &t, &limits).await.is_ok());

        // A 16:9 landscape keeps ~32% of its area.
        let mut landscape = m.clone();
        landscape.width = Some(1920);
        landscape.height = Some(1080);
        assert!(validate(art(landscape.clone()), &t, &limits).await.is_ok());
        let strict = ValidationLimits {
            min_crop_keep: 0.5,
            ..limits
        };
        let err = validate(art(landscape), &t, &strict).await.unwrap_err();
        assert!(err.is_validation());

        let mut zero = m.clone();
        zero.width = Some(0);
        assert!(validate(art(zero), &t, &limits).await.is_err());

        let empty = write(dir.path(), "empty.png", b"");
        assert!(validate(art(media(&empty, MediaKind::Image)), &t, &limits).await.is_err());

        let missing = dir.path().join("missing.png");
        assert!(validate(art(media(&missing, MediaKind::Image)), &t, &limits).await.is_err());
    }

    #[tokio::test]
    async fn audio_must_cover_target() {
        let dir = tempfile::tempdir().unwrap();
        let t = TargetSpec::default();
        let limits = ValidationLimits::default();
        let path = write(dir.path(), "a.wav", b"RIFF");
        let art = |d: Option<Duration>| {
            let mut m = media(&path, MediaKind::Audio);
            m.duration = d;
            Artifact::new(Capability::Audio, Payload::Media(m), "a")
        };

        assert!(validate(art(Some(Duration::from_secs(30))), &t, &limits).await.is_ok());
        assert!(validate(art(Some(Duration::from_secs(15))), &t, &limits).await.is_ok());
        assert!(validate(art(Some(Duration::from_secs(10))), &t, &limits).await.is_err());
        assert!(validate(art(None), &t, &limits).await.is_err());
    }

    #[tokio::test]
    async fn composition_must_match_target_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let t = TargetSpec::default();
        let limits = ValidationLimits::default();
        let path = write(dir.path(), "short.mp4", b"mp4!");
        let art = |d: Duration, w: u32, h: u32| {
            let mut m = media(&path, MediaKind::Video);
            m.duration = Some(d);
            m.width = Some(w);
            m.height = Some(h);
            Artifact::new(Capability::Composition, Payload::Media(m), "ffmpeg")
        };

        assert!(validate(art(Duration::from_secs(15), 1080, 1920), &t, &limits).await.is_ok());
        assert!(validate(art(Duration::from_secs(14), 1080, 1920), &t, &limits).await.is_err());
        assert!(validate(art(Duration::from_secs(15), 1920, 1080), &t, &limits).await.is_err());
    }

    #[tokio::test]
    async fn publish_needs_id() {
        let t = TargetSpec::default();
        let limits = ValidationLimits::default();
        let art = |id: &str| {
            Artifact::new(
                Capability::Publish,
                Payload::Published(shortforge_core::PublishReceipt {
                    id: id.into(),
                    url: None,
                }),
                "yt",
            )
        };
        assert!(validate(art("dQw4w9WgXcQ"), &t, &limits).await.is_ok());
        assert!(validate(art("  "), &t, &limits).await.is_err());

        let wrong = Artifact::new(Capability::Publish, Payload::text("id"), "yt");
        assert!(validate(wrong, &t, &limits).await.is_err());
    }
}
