//! Hugging Face Inference API providers.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use shortforge_core::{Capability, Payload, ProviderError};
use shortforge_pipeline::{ProviderClient, ResolveContext};

use super::http::{self, ApiClient};
use super::ProviderEnv;

#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub api_token: String,
    pub model: String,
    pub base_url: String,
}

impl InferenceSettings {
    pub fn new(api_token: &str, model: &str, base_url: &str) -> Self {
        Self {
            api_token: api_token.to_string(),
            model: model.trim_matches('/').to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }
}

/// Extract `generated_text` from either `[{"generated_text": ..}]` or
/// `{"generated_text": ..}`.
fn generated_text(value: &Value) -> Option<&str> {
    let object = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    object.get("generated_text")?.as_str()
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub struct HuggingfaceText {
    name: String,
    api: ApiClient,
    settings: InferenceSettings,
    instruction: String,
}

impl HuggingfaceText {
    pub fn new(
        name: String,
        client: reqwest::Client,
        settings: InferenceSettings,
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
impl ProviderClient for HuggingfaceText {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Prompt
    }

    async fn invoke(&self, _ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        http::require_secret(&self.settings.api_token, "Hugging Face token")?;

        let request = self
            .api
            .inner()
            .post(self.settings.endpoint())
            .bearer_auth(&self.settings.api_token)
            .json(&json!({ "inputs": self.instruction }));
        let value: Value = self.api.json(request).await?;

        let text = generated_text(&value).ok_or_else(|| http::malformed("no generated_text"))?;
        // Completion models echo the instruction before the generated text.
        let text = text.strip_prefix(self.instruction.as_str()).unwrap_or(text);

        Ok(Payload::text(text.trim()))
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

pub struct HuggingfaceImage {
    name: String,
    api: ApiClient,
    env: ProviderEnv,
    settings: InferenceSettings,
}

impl HuggingfaceImage {
    pub fn new(name: String, env: ProviderEnv, settings: InferenceSettings) -> Self {
        Self {
            name,
            api: ApiClient::new(env.http.clone()),
            env,
            settings,
        }
    }
}

#[async_trait]
impl ProviderClient for HuggingfaceImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Visual
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        http::require_secret(&self.settings.api_token, "Hugging Face token")?;
        let prompt = ctx
            .prompt()
            .ok_or_else(|| ProviderError::unavailable("no prompt to illustrate"))?;

        let request = self
            .api
            .inner()
            .post(self.settings.endpoint())
            .bearer_auth(&self.settings.api_token)
            .json(&json!({ "inputs": prompt }));
        let response = self.api.send(request).await?;

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        if !mime.starts_with("image/") {
            // A model that is still loading answers 200 with a JSON status.
            return Err(http::malformed(format!("expected an image, got {mime}")));
        }

        let bytes = response.bytes().await.map_err(ProviderError::transport)?;
        let path = ctx.file(&format!("hf-image.{}", http::image_extension(&mime)));
        http::write_body(&path, &bytes).await?;
        tracing::debug!(provider = %self.name, bytes = bytes.len(), "image generated");

        Ok(Payload::Media(self.env.probe(&path, true).await?))
    }
}
