//! Concrete [`ProviderClient`] implementations and the factory that builds
//! them from `[[providers]]` entries.
//!
//! # Module layout
//!
//! - [`http`] -- rate-limited `reqwest` plumbing and status mapping.
//! - [`gemini`] -- Gemini text and image generation.
//! - [`huggingface`] -- Hugging Face text and text-to-image inference.
//! - [`pexels`] -- portrait stock video search.
//! - [`local`] -- picks from local image and music directories.
//! - [`ytdlp`] -- downloads a royalty-free track with `yt-dlp`.
//! - [`fallback`] -- terminal providers that always succeed.

pub mod fallback;
pub mod gemini;
pub mod http;
pub mod huggingface;
pub mod local;
pub mod pexels;
pub mod ytdlp;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use shortforge_av::{
    probe_media_file, CompositeProber, FfmpegCompositor, FfprobeProber, Prober, RustProber,
    ToolRegistry,
};
use shortforge_core::{MediaFile, ProviderError};
use shortforge_pipeline::{
    CompositionProvider, ProviderClient, PublishProvider, Publisher, RetryingPublisher,
};

use crate::config::{Config, ProviderConfig, ProviderSettings};
use crate::publishers::{ArchivePublisher, YoutubePublisher};

/// Process-wide resources shared by all providers.
#[derive(Clone)]
pub struct ProviderEnv {
    pub http: reqwest::Client,
    pub tools: Arc<ToolRegistry>,
    pub prober: Arc<dyn Prober>,
}

impl ProviderEnv {
    /// Discover tools and build the HTTP client and prober.
    pub fn from_config(config: &Config) -> Result<Self> {
        let tools = ToolRegistry::discover(&config.tools);
        let http = http::build_client().context("Failed to build HTTP client")?;
        Ok(Self::new(http, tools))
    }

    pub fn new(http: reqwest::Client, tools: ToolRegistry) -> Self {
        let mut probers: Vec<Box<dyn Prober>> = vec![Box::new(RustProber::new())];
        if let Some(ffprobe) = tools.get("ffprobe") {
            probers.push(Box::new(FfprobeProber::new(
                ffprobe.path.clone(),
                ffprobe.timeout,
            )));
        }

        Self {
            http,
            tools: Arc::new(tools),
            prober: Arc::new(CompositeProber::new(probers)),
        }
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    /// Probe a file a provider produced or picked.
    pub async fn probe(&self, path: &Path, owned: bool) -> Result<MediaFile, ProviderError> {
        Ok(probe_media_file(self.prober.as_ref(), path, owned).await?)
    }
}

/// Build the client for one provider entry.
pub fn build_provider(
    spec: &ProviderConfig,
    config: &Config,
    env: &ProviderEnv,
) -> Result<Arc<dyn ProviderClient>> {
    let name = spec.name.clone();
    let client: Arc<dyn ProviderClient> = match &spec.settings {
        ProviderSettings::GeminiText {
            api_key,
            model,
            base_url,
            instruction,
        } => Arc::new(gemini::GeminiText::new(
            name,
            env.http.clone(),
            gemini::GeminiSettings::new(api_key, model, base_url),
            instruction.clone(),
        )),
        ProviderSettings::GeminiImage {
            api_key,
            model,
            base_url,
        } => Arc::new(gemini::GeminiImage::new(
            name,
            env.clone(),
            gemini::GeminiSettings::new(api_key, model, base_url),
        )),
        ProviderSettings::HuggingfaceText {
            api_token,
            model,
            base_url,
            instruction,
        } => Arc::new(huggingface::HuggingfaceText::new(
            name,
            env.http.clone(),
            huggingface::InferenceSettings::new(api_token, model, base_url),
            instruction.clone(),
        )),
        ProviderSettings::HuggingfaceImage {
            api_token,
            model,
            base_url,
        } => Arc::new(huggingface::HuggingfaceImage::new(
            name,
            env.clone(),
            huggingface::InferenceSettings::new(api_token, model, base_url),
        )),
        ProviderSettings::Pexels { api_key, base_url } => Arc::new(pexels::PexelsVideo::new(
            name,
            env.clone(),
            api_key.clone(),
            base_url.clone(),
        )),
        ProviderSettings::LocalImages { dir } => {
            Arc::new(local::LocalImages::new(name, env.clone(), dir.clone()))
        }
        ProviderSettings::LocalMusic { dir } => {
            Arc::new(local::LocalMusic::new(name, env.clone(), dir.clone()))
        }
        ProviderSettings::YtDlp { tracks } => {
            Arc::new(ytdlp::YtDlpMusic::new(name, env.clone(), tracks.clone()))
        }
        ProviderSettings::StaticPrompts { prompts } => {
            if prompts.iter().all(|p| p.trim().is_empty()) {
                anyhow::bail!("Provider '{}' has no prompts", spec.name);
            }
            Arc::new(fallback::StaticPrompts::new(name, prompts.clone()))
        }
        ProviderSettings::SolidColor { color } => {
            let rgb = shortforge_av::frame::parse_hex_color(color).with_context(|| {
                format!("Provider '{}' has an invalid color {:?}", spec.name, color)
            })?;
            Arc::new(fallback::SolidColor::new(name, rgb))
        }
        ProviderSettings::Silence => Arc::new(fallback::Silence::new(name)),
        ProviderSettings::Ffmpeg { .. } => {
            let ffmpeg = env.tools.require("ffmpeg").with_context(|| {
                format!(
                    "Provider '{}' needs ffmpeg; install it or set tools.ffmpeg_path",
                    spec.name
                )
            })?;
            let mut compositor = FfmpegCompositor::new(ffmpeg.clone(), Arc::clone(&env.prober));
            if let Some(settings) = spec.settings.encode_settings() {
                compositor = compositor.with_settings(settings);
            }
            Arc::new(CompositionProvider::new(name, Arc::new(compositor)))
        }
        ProviderSettings::Youtube {
            token_path,
            upload_url,
            token_url,
        } => publish_provider(
            name,
            Arc::new(YoutubePublisher::new(
                env.http.clone(),
                token_path.clone(),
                upload_url.clone(),
                token_url.clone(),
            )),
            config,
        ),
        ProviderSettings::Archive { dir } => {
            publish_provider(name, Arc::new(ArchivePublisher::new(dir.clone())), config)
        }
    };

    tracing::debug!(
        provider = %spec.name,
        capability = %spec.capability,
        priority = spec.priority,
        kind = spec.settings.type_name(),
        "provider registered"
    );

    Ok(client)
}

fn publish_provider(
    name: String,
    publisher: Arc<dyn Publisher>,
    config: &Config,
) -> Arc<dyn ProviderClient> {
    let retrying = RetryingPublisher::new(publisher, config.publish.retry);
    Arc::new(PublishProvider::new(
        name,
        Arc::new(retrying),
        config.publish.template(),
    ))
}
