//! Google Gemini `generateContent` providers.
//!
//! [`GeminiText`] asks for a short idea and serves the prompt capability;
//! [`GeminiImage`] requests an image for the prompt and decodes the inline
//! base64 payload into the run workspace.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use shortforge_core::{Capability, Payload, ProviderError};
use shortforge_pipeline::{ProviderClient, ResolveContext};

use super::http::{self, ApiClient};
use super::ProviderEnv;

/// Endpoint settings shared by both Gemini providers.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiSettings {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }

    fn first_text(&self) -> Option<&str> {
        self.parts()
            .filter_map(|p| p.text.as_deref())
            .map(str::trim)
            .find(|t| !t.is_empty())
    }

    fn first_image(&self) -> Option<&InlineData> {
        self.parts()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| d.mime_type.starts_with("image/"))
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub struct GeminiText {
    name: String,
    api: ApiClient,
    settings: GeminiSettings,
    instruction: String,
}

impl GeminiText {
    pub fn new(
        name: String,
        client: reqwest::Client,
        settings: GeminiSettings,
        instruction: String,
    ) -> Self {
        Self {
            name,
            api: ApiClient::new(client),
            settings,
            instruction,
        }
    }
}

#[async_trait]
impl ProviderClient for GeminiText {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Prompt
    }

    async fn invoke(&self, _ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        http::require_secret(&self.settings.api_key, "Gemini API key")?;

        let request = self
            .api
            .inner()
            .post(self.settings.endpoint())
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&json!({ "contents": [{ "parts": [{ "text": self.instruction }] }] }));

        let response: GenerateResponse = self.api.json(request).await?;
        let text = response
            .first_text()
            .ok_or_else(|| http::malformed("no text candidate"))?;

        Ok(Payload::text(text))
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

pub struct GeminiImage {
    name: String,
    api: ApiClient,
    env: ProviderEnv,
    settings: GeminiSettings,
}

impl GeminiImage {
    pub fn new(name: String, env: ProviderEnv, settings: GeminiSettings) -> Self {
        Self {
            name,
            api: ApiClient::new(env.http.clone()),
            env,
            settings,
        }
    }
}

#[async_trait]
impl ProviderClient for GeminiImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Visual
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        http::require_secret(&self.settings.api_key, "Gemini API key")?;
        let prompt = ctx
            .prompt()
            .ok_or_else(|| ProviderError::unavailable("no prompt to illustrate"))?;

        let body = json!({
            "contents": [{ "parts": [{ "text": format!("Vertical 9:16 image: {prompt}") }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
        });
        let request = self
            .api
            .inner()
            .post(self.settings.endpoint())
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&body);

        let response: GenerateResponse = self.api.json(request).await?;
        let image = response
            .first_image()
            .ok_or_else(|| http::malformed("no inline image data"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image.data.trim())
            .map_err(|e| http::malformed(format!("invalid base64 image: {e}")))?;

        let path = ctx.file(&format!(
            "gemini-image.{}",
            http::image_extension(&image.mime_type)
        ));
        http::write_body(&path, &bytes).await?;
        tracing::debug!(provider = %self.name, bytes = bytes.len(), "image generated");

        Ok(Payload::Media(self.env.probe(&path, true).await?))
    }
}
