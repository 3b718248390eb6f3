//! Shared plumbing for HTTP-backed providers.
//!
//! Every remote provider owns an [`ApiClient`]: a shared `reqwest` client
//! plus its own token-bucket limiter. Responses are mapped onto
//! [`ProviderError`] so a failing service simply advances the chain.

use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use reqwest::{RequestBuilder, Response};
use shortforge_core::ProviderError;

/// Default request timeout of the shared client. Chain timeouts are usually
/// tighter and win.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Requests per second allowed against one provider.
const REQUESTS_PER_SECOND: u32 = 2;

/// Maximum number of body characters kept in an error.
const ERROR_BODY_LIMIT: usize = 300;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Build the client shared by all providers of a process.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("shortforge/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// A rate-limited handle on the shared client.
pub struct ApiClient {
    client: reqwest::Client,
    limiter: DirectLimiter,
}

impl ApiClient {
    pub fn new(client: reqwest::Client) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN));
        Self {
            client,
            limiter: RateLimiter::direct(quota),
        }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Wait for the limiter, send, and reject non-success statuses.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        self.limiter.until_ready().await;
        let response = request.send().await.map_err(ProviderError::transport)?;
        check_status(response).await
    }

    /// [`ApiClient::send`] and decode a JSON body.
    pub async fn json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| malformed(format!("invalid JSON body: {e}")))
    }
}

/// Turn a non-2xx response into [`ProviderError::Status`] with a body excerpt.
pub async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::status(status.as_u16(), &excerpt(&body)))
}

/// A response that arrived but did not contain what the provider needs.
pub fn malformed(reason: impl Into<String>) -> ProviderError {
    ProviderError::transport(format!("malformed response: {}", reason.into()))
}

/// Fail fast when a credential expanded to nothing.
pub fn require_secret(secret: &str, what: &str) -> Result<(), ProviderError> {
    if secret.trim().is_empty() {
        return Err(ProviderError::unavailable(format!("no {what} configured")));
    }
    Ok(())
}

/// Store a downloaded body in the run workspace.
pub async fn write_body(path: &Path, bytes: &[u8]) -> Result<(), ProviderError> {
    if bytes.is_empty() {
        return Err(malformed("empty body"));
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// File extension for an image MIME type.
pub fn image_extension(mime: &str) -> &'static str {
    match mime.split(';').next().unwrap_or_default().trim() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    cut.push_str("...");
    cut
}
