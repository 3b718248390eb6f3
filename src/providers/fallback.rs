//! Terminal providers: they need no network or assets and always succeed,
//! so each must be the last entry of its chain.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use shortforge_av::audio::write_silence_wav;
use shortforge_av::frame::solid_color_frame;
use shortforge_core::{Capability, MediaFile, MediaKind, Payload, ProviderError};
use shortforge_pipeline::{ProviderClient, ResolveContext};

/// Picks one prompt of a fixed list at random.
pub struct StaticPrompts {
    name: String,
    prompts: Vec<String>,
}

impl StaticPrompts {
    pub fn new(name: String, prompts: Vec<String>) -> Self {
        let prompts = prompts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { name, prompts }
    }
}

#[async_trait]
impl ProviderClient for StaticPrompts {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Prompt
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn invoke(&self, _ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        self.prompts
            .choose(&mut rand::thread_rng())
            .map(|p| Payload::text(p.as_str()))
            .ok_or_else(|| ProviderError::unavailable("prompt list is empty"))
    }
}

/// A single-color frame at the target resolution.
pub struct SolidColor {
    name: String,
    rgb: [u8; 3],
}

impl SolidColor {
    pub fn new(name: String, rgb: [u8; 3]) -> Self {
        Self { name, rgb }
    }
}

#[async_trait]
impl ProviderClient for SolidColor {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Visual
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        let path = ctx.file("solid-color.png");
        let (width, height) = (ctx.target.width, ctx.target.height);
        let rgb = self.rgb;

        let dst = path.clone();
        tokio::task::spawn_blocking(move || solid_color_frame(&dst, width, height, rgb))
            .await
            .map_err(|e| ProviderError::transport(format!("frame task failed: {e}")))??;

        let size = tokio::fs::metadata(&path).await?.len();
        Ok(Payload::Media(MediaFile {
            path,
            kind: MediaKind::Image,
            size,
            width: Some(width),
            height: Some(height),
            duration: None,
            owned: true,
        }))
    }
}

/// A silent WAV exactly as long as the target.
pub struct Silence {
    name: String,
}

impl Silence {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

#[async_trait]
impl ProviderClient for Silence {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Audio
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        let path = ctx.file("silence.wav");
        let duration = ctx.target.duration;

        let dst = path.clone();
        tokio::task::spawn_blocking(move || write_silence_wav(&dst, duration))
            .await
            .map_err(|e| ProviderError::transport(format!("silence task failed: {e}")))??;

        let size = tokio::fs::metadata(&path).await?.len();
        Ok(Payload::Media(MediaFile {
            path,
            kind: MediaKind::Audio,
            size,
            width: None,
            height: None,
            duration: Some(duration),
            owned: true,
        }))
    }
}
