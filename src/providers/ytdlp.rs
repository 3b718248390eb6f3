//! Downloads one track of a configured royalty-free list with `yt-dlp`.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use shortforge_core::{Capability, Payload, ProviderError};
use shortforge_pipeline::{ProviderClient, ResolveContext};

use super::ProviderEnv;

const OUTPUT_STEM: &str = "ytdlp-track";

pub struct YtDlpMusic {
    name: String,
    env: ProviderEnv,
    tracks: Vec<String>,
}

impl YtDlpMusic {
    pub fn new(name: String, env: ProviderEnv, tracks: Vec<String>) -> Self {
        Self { name, env, tracks }
    }
}

#[async_trait]
impl ProviderClient for YtDlpMusic {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Audio
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        let tool = self
            .env
            .tools
            .get("yt-dlp")
            .ok_or_else(|| ProviderError::unavailable("yt-dlp is not installed"))?;
        let url = self
            .tracks
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| ProviderError::unavailable("no tracks configured"))?;

        let template = ctx.file(&format!("{OUTPUT_STEM}.%(ext)s"));
        let mut cmd = tool.command();
        cmd.args(["--no-playlist", "--quiet", "-x", "--audio-format", "mp3", "-o"])
            .path_arg(&template)
            .arg(url.as_str());

        tracing::debug!(provider = %self.name, url = %url, "downloading track");
        cmd.execute().await?;

        let path = ctx.file(&format!("{OUTPUT_STEM}.mp3"));
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ProviderError::transport(format!(
                "yt-dlp finished without writing {}",
                path.display()
            )));
        }

        Ok(Payload::Media(self.env.probe(&path, true).await?))
    }
}
