//! YouTube Data API v3 publisher using a resumable upload.
//!
//! Credentials come from a `token.json` file as written by the Google auth
//! libraries. When the file carries refresh credentials, an expired access
//! token is refreshed once per upload attempt.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use shortforge_core::{MediaFile, PublishReceipt};
use shortforge_pipeline::{PublishError, PublishMetadata, Publisher};
use tokio::sync::Mutex;

const VIDEO_MIME: &str = "video/mp4";
const ERROR_BODY_LIMIT: usize = 300;

/// Contents of `token.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenFile {
    #[serde(alias = "access_token")]
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_uri: Option<String>,
}

impl TokenFile {
    pub async fn load(path: &Path) -> Result<Self, PublishError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            PublishError::permanent(format!("cannot read token file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            PublishError::permanent(format!("invalid token file {}: {e}", path.display()))
        })
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// Map an HTTP failure onto retry semantics: rate limiting and server errors
/// are transient, everything else (auth, quota, bad request) is permanent.
pub fn classify(step: &str, status: StatusCode, body: &str) -> PublishError {
    let body: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
    let message = format!("YouTube {step} returned {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PublishError::transient(message)
    } else {
        PublishError::permanent(message)
    }
}

async fn ensure_success(step: &str, response: Response) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(step, status, &body))
}

fn network(step: &str, err: reqwest::Error) -> PublishError {
    PublishError::transient(format!("YouTube {step} failed: {err}"))
}

pub struct YoutubePublisher {
    client: reqwest::Client,
    token_path: PathBuf,
    upload_url: String,
    token_url: String,
    access_token: Mutex<Option<String>>,
}

impl YoutubePublisher {
    pub fn new(
        client: reqwest::Client,
        token_path: PathBuf,
        upload_url: String,
        token_url: String,
    ) -> Self {
        Self {
            client,
            token_path,
            upload_url,
            token_url,
            access_token: Mutex::new(None),
        }
    }

    async fn refresh(&self, token: &TokenFile) -> Result<String, PublishError> {
        let url = token.token_uri.as_deref().unwrap_or(&self.token_url);
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", token.refresh_token.as_deref().unwrap_or_default()),
            ("client_id", token.client_id.as_deref().unwrap_or_default()),
            ("client_secret", token.client_secret.as_deref().unwrap_or_default()),
        ];

        let response = self
            .client
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| network("token refresh", e))?;
        let response = ensure_success("token refresh", response).await?;
        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| PublishError::permanent(format!("invalid token refresh response: {e}")))?;

        tracing::debug!("refreshed YouTube access token");
        *self.access_token.lock().await = Some(refreshed.access_token.clone());
        Ok(refreshed.access_token)
    }

    async fn start_session(
        &self,
        access_token: &str,
        size: u64,
        metadata: &PublishMetadata,
    ) -> Result<Response, PublishError> {
        let body = json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.tags,
                "categoryId": metadata.category_id,
            },
            "status": {
                "privacyStatus": metadata.visibility.as_str(),
                "selfDeclaredMadeForKids": metadata.made_for_kids,
            }
        });

        self.client
            .post(&self.upload_url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", VIDEO_MIME)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| network("upload session", e))
    }
}

#[async_trait]
impl Publisher for YoutubePublisher {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn publish(
        &self,
        media: &MediaFile,
        metadata: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        let token = TokenFile::load(&self.token_path).await?;
        let cached = self.access_token.lock().await.clone();
        let access = match cached.or_else(|| token.token.clone()) {
            Some(access) => access,
            None if token.can_refresh() => self.refresh(&token).await?,
            None => {
                return Err(PublishError::permanent(
                    "token file has neither an access token nor refresh credentials",
                ))
            }
        };

        let bytes = tokio::fs::read(&media.path).await.map_err(|e| {
            PublishError::permanent(format!("cannot read {}: {e}", media.path.display()))
        })?;
        let size = bytes.len() as u64;

        let mut session = self.start_session(&access, size, metadata).await?;
        let mut access = access;
        if session.status() == StatusCode::UNAUTHORIZED && token.can_refresh() {
            access = self.refresh(&token).await?;
            session = self.start_session(&access, size, metadata).await?;
        }
        let session = ensure_success("upload session", session).await?;

        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PublishError::permanent("upload session response has no Location"))?;

        tracing::info!(bytes = size, "uploading video");
        let response = self
            .client
            .put(&location)
            .bearer_auth(&access)
            .header(CONTENT_TYPE, VIDEO_MIME)
            .body(bytes)
            .send()
            .await
            .map_err(|e| network("upload", e))?;
        let response = ensure_success("upload", response).await?;
        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| PublishError::permanent(format!("invalid upload response: {e}")))?;

        if uploaded.id.trim().is_empty() {
            return Err(PublishError::permanent("upload response has an empty id"));
        }

        tracing::info!(video_id = %uploaded.id, "video uploaded");
        Ok(PublishReceipt {
            url: Some(format!("https://youtu.be/{}", uploaded.id)),
            id: uploaded.id,
        })
    }
}
