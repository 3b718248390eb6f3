//! Pexels stock video search for portrait clips.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use shortforge_core::{Capability, Payload, ProviderError, TargetSpec};
use shortforge_pipeline::{ProviderClient, ResolveContext};

use super::http::{self, ApiClient};
use super::ProviderEnv;

const PER_PAGE: &str = "15";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct VideoFile {
    link: String,
    width: Option<u32>,
    height: Option<u32>,
    file_type: Option<String>,
}

/// Choose the portrait mp4 rendition closest to the target height, preferring
/// clips at least as long as the target.
fn pick_rendition(videos: &[Video], target: &TargetSpec) -> Option<VideoFile> {
    let wanted = target.duration.as_secs();
    let mut ordered: Vec<&Video> = videos.iter().collect();
    ordered.sort_by_key(|v| v.duration < wanted);

    ordered.into_iter().find_map(|video| {
        video
            .video_files
            .iter()
            .filter(|f| f.file_type.as_deref().map_or(true, |t| t == "video/mp4"))
            .filter(|f| matches!((f.width, f.height), (Some(w), Some(h)) if h >= w))
            .min_by_key(|f| f.height.unwrap_or(0).abs_diff(target.height))
            .cloned()
    })
}

pub struct PexelsVideo {
    name: String,
    api: ApiClient,
    env: ProviderEnv,
    api_key: String,
    base_url: String,
}

impl PexelsVideo {
    pub fn new(name: String, env: ProviderEnv, api_key: String, base_url: String) -> Self {
        Self {
            name,
            api: ApiClient::new(env.http.clone()),
            env,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProviderClient for PexelsVideo {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Visual
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        http::require_secret(&self.api_key, "Pexels API key")?;
        let prompt = ctx
            .prompt()
            .ok_or_else(|| ProviderError::unavailable("no prompt to search for"))?;

        let request = self
            .api
            .inner()
            .get(format!("{}/videos/search", self.base_url))
            .header(AUTHORIZATION, &self.api_key)
            .query(&[
                ("query", prompt),
                ("orientation", "portrait"),
                ("per_page", PER_PAGE),
            ]);
        let response: SearchResponse = self.api.json(request).await?;

        let file = pick_rendition(&response.videos, &ctx.target).ok_or_else(|| {
            ProviderError::unavailable(format!("no portrait video found for {prompt:?}"))
        })?;
        tracing::debug!(provider = %self.name, link = %file.link, "downloading stock video");

        let download = self.api.send(self.api.inner().get(&file.link)).await?;
        let bytes = download.bytes().await.map_err(ProviderError::transport)?;
        let path = ctx.file("pexels.mp4");
        http::write_body(&path, &bytes).await?;

        Ok(Payload::Media(self.env.probe(&path, true).await?))
    }
}
