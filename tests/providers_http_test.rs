//! Remote providers against mocked HTTP APIs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use shortforge::config::{Config, ProviderConfig, ProviderSettings};
use shortforge::providers::{build_provider, ProviderEnv};
use shortforge_av::{MediaProbe, Prober, ToolRegistry};
use shortforge_core::{Artifact, Capability, MediaKind, Payload, ProviderError, RunId, TargetSpec};
use shortforge_pipeline::{ProviderClient, ResolveContext};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn env() -> ProviderEnv {
    ProviderEnv::new(reqwest::Client::new(), ToolRegistry::default())
}

fn client(
    capability: Capability,
    settings: ProviderSettings,
    env: &ProviderEnv,
) -> Arc<dyn ProviderClient> {
    let spec = ProviderConfig::new("under-test", capability, 0, settings);
    build_provider(&spec, &Config::default(), env).unwrap()
}

fn context(dir: &TempDir, prompt: Option<&str>) -> ResolveContext {
    let target = TargetSpec::new(Duration::from_secs(15), 1080, 1920, 30);
    let ctx = ResolveContext::new(RunId::new(), dir.path(), target);
    match prompt {
        Some(p) => ctx.with_artifact(Artifact::new(Capability::Prompt, Payload::text(p), "test")),
        None => ctx,
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    shortforge_av::frame::solid_color_frame(&path, width, height, [10, 20, 30]).unwrap();
    std::fs::read(path).unwrap()
}

fn gemini_text(server: &MockServer, key: &str) -> ProviderSettings {
    ProviderSettings::GeminiText {
        api_key: key.into(),
        model: "flash".into(),
        base_url: format!("{}/v1beta", server.uri()),
        instruction: "Give me an idea".into(),
    }
}

/// Reports every file as a portrait video of fixed length.
struct FixedVideoProber;

#[async_trait]
impl Prober for FixedVideoProber {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn supports(&self, _path: &Path) -> bool {
        true
    }

    async fn probe(&self, _path: &Path) -> shortforge_core::Result<MediaProbe> {
        Ok(MediaProbe {
            kind: Some(MediaKind::Video),
            width: Some(1080),
            height: Some(1920),
            duration: Some(Duration::from_secs(20)),
        })
    }
}

#[tokio::test]
async fn gemini_text_returns_first_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/flash:generateContent"))
        .and(query_param("key", "secret"))
        .and(body_string_contains("Give me an idea"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "  Tiny habits, big wins  \n" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = client(Capability::Prompt, gemini_text(&server, "secret"), &env());
    let payload = provider.invoke(&context(&dir, None)).await.unwrap();
    assert_eq!(payload, Payload::text("Tiny habits, big wins"));
}

#[tokio::test]
async fn gemini_rate_limit_is_a_status_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = client(Capability::Prompt, gemini_text(&server, "secret"), &env());
    let err = provider.invoke(&context(&dir, None)).await.unwrap_err();
    match err {
        ProviderError::Status { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("RESOURCE_EXHAUSTED"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn gemini_without_key_is_unavailable_and_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = client(Capability::Prompt, gemini_text(&server, ""), &env());
    let err = provider.invoke(&context(&dir, None)).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)), "{err:?}");
}

#[tokio::test]
async fn gemini_image_is_decoded_into_workspace() {
    let server = MockServer::start().await;
    let png = png_bytes(90, 160);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
    Mock::given(method("POST"))
        .and(path("/v1beta/models/painter:generateContent"))
        .and(body_string_contains("Vertical 9:16 image: a lighthouse at dusk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here you go" },
                { "inlineData": { "mimeType": "image/png", "data": encoded } }
            ] } }]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = client(
        Capability::Visual,
        ProviderSettings::GeminiImage {
            api_key: "secret".into(),
            model: "painter".into(),
            base_url: format!("{}/v1beta", server.uri()),
        },
        &env(),
    );
    let payload = provider
        .invoke(&context(&dir, Some("a lighthouse at dusk")))
        .await
        .unwrap();

    let Payload::Media(media) = payload else {
        panic!("expected media, got {payload:?}");
    };
    assert!(media.path.starts_with(dir.path()));
    assert!(media.owned);
    assert_eq!(media.kind, MediaKind::Image);
    assert_eq!(media.dimensions(), Some((90, 160)));
}

#[tokio::test]
async fn huggingface_text_strips_echoed_instruction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .and(header("authorization", "Bearer hf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "generated_text": "Write an idea: Five-second desk stretch" }
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = client(
        Capability::Prompt,
        ProviderSettings::HuggingfaceText {
            api_token: "hf-token".into(),
            model: "gpt2".into(),
            base_url: format!("{}/models", server.uri()),
            instruction: "Write an idea:".into(),
        },
        &env(),
    );
    let payload = provider.invoke(&context(&dir, None)).await.unwrap();
    assert_eq!(payload, Payload::text("Five-second desk stretch"));
}

#[tokio::test]
async fn huggingface_image_writes_png() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/sd"))
        .and(body_string_contains("neon city"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png_bytes(72, 128), "image/png"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = client(
        Capability::Visual,
        ProviderSettings::HuggingfaceImage {
            api_token: "hf-token".into(),
            model: "sd".into(),
            base_url: format!("{}/models", server.uri()),
        },
        &env(),
    );
    let payload = provider.invoke(&context(&dir, Some("neon city"))).await.unwrap();
    let Payload::Media(media) = payload else {
        panic!("expected media, got {payload:?}");
    };
    assert_eq!(media.path, dir.path().join("hf-image.png"));
    assert_eq!(media.dimensions(), Some((72, 128)));
}

#[tokio::test]
async fn huggingface_loading_model_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "error": "Model is currently loading" })),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = client(
        Capability::Visual,
        ProviderSettings::HuggingfaceImage {
            api_token: "hf-token".into(),
            model: "sd".into(),
            base_url: format!("{}/models", server.uri()),
        },
        &env(),
    );
    let err = provider
        .invoke(&context(&dir, Some("neon city")))
        .await
        .unwrap_err();
    assert_eq!(err.class(), "transport");
    assert!(err.to_string().contains("expected an image"));
}

#[tokio::test]
async fn pexels_downloads_portrait_rendition() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/videos/search"))
        .and(header("authorization", "px-key"))
        .and(query_param("query", "ocean waves"))
        .and(query_param("orientation", "portrait"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "videos": [
                {
                    "duration": 5,
                    "video_files": [
                        { "link": format!("{base}/files/short.mp4"), "width": 1080, "height": 1920, "file_type": "video/mp4" }
                    ]
                },
                {
                    "duration": 30,
                    "video_files": [
                        { "link": format!("{base}/files/wide.mp4"), "width": 1920, "height": 1080, "file_type": "video/mp4" },
                        { "link": format!("{base}/files/small.mp4"), "width": 360, "height": 640, "file_type": "video/mp4" },
                        { "link": format!("{base}/files/long.mp4"), "width": 1080, "height": 1920, "file_type": "video/mp4" }
                    ]
                }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/long.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"mp4 bytes".to_vec(), "video/mp4"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let env = env().with_prober(Arc::new(FixedVideoProber));
    let provider = client(
        Capability::Visual,
        ProviderSettings::Pexels {
            api_key: "px-key".into(),
            base_url: base.clone(),
        },
        &env,
    );
    let payload = provider.invoke(&context(&dir, Some("ocean waves"))).await.unwrap();
    let Payload::Media(media) = payload else {
        panic!("expected media, got {payload:?}");
    };
    assert_eq!(media.path, dir.path().join("pexels.mp4"));
    assert_eq!(media.kind, MediaKind::Video);
    assert_eq!(std::fs::read(&media.path).unwrap(), b"mp4 bytes");
}

#[tokio::test]
async fn pexels_without_results_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "videos": [] })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = client(
        Capability::Visual,
        ProviderSettings::Pexels {
            api_key: "px-key".into(),
            base_url: server.uri(),
        },
        &env(),
    );
    let err = provider
        .invoke(&context(&dir, Some("ocean waves")))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)), "{err:?}");
}
