//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], a temporary tree with asset directories, a run
//! work directory and an output directory, plus stub compositor and publisher
//! implementations that never touch ffmpeg or the network.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shortforge::config::{Config, ProviderConfig, ProviderSettings};
use shortforge::providers::ProviderEnv;
use shortforge_av::audio::write_silence_wav;
use shortforge_av::frame::solid_color_frame;
use shortforge_av::{CompositionRequest, Compositor, ToolRegistry};
use shortforge_core::{Capability, MediaFile, MediaKind, PublishReceipt};
use shortforge_pipeline::{PublishError, PublishMetadata, Publisher};
use tempfile::TempDir;

pub struct TestHarness {
    pub root: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        for dir in ["images", "music", "work", "outputs"] {
            std::fs::create_dir_all(root.path().join(dir)).expect("failed to create dir");
        }
        Self { root }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.path().join("images")
    }

    pub fn music_dir(&self) -> PathBuf {
        self.root.path().join("music")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root.path().join("work")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.path().join("outputs")
    }

    /// Write a solid PNG into the images directory.
    pub fn image(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.images_dir().join(name);
        solid_color_frame(&path, width, height, [200, 80, 40]).expect("failed to write png");
        path
    }

    /// Write a silent WAV into the music directory.
    pub fn track(&self, name: &str, secs: u64) -> PathBuf {
        let path = self.music_dir().join(name);
        write_silence_wav(&path, Duration::from_secs(secs)).expect("failed to write wav");
        path
    }

    /// Entries left in the work directory.
    pub fn leftover_workspaces(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work_dir())
            .expect("failed to read work dir")
            .map(|e| e.expect("bad dir entry").path())
            .collect()
    }

    /// Provider resources without any external tools.
    pub fn env(&self) -> ProviderEnv {
        ProviderEnv::new(reqwest::Client::new(), ToolRegistry::default())
    }

    /// Default config pointed at the harness directories.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.run.work_dir = Some(self.work_dir());
        for provider in config.providers.iter_mut() {
            match &mut provider.settings {
                ProviderSettings::LocalImages { dir } => *dir = self.images_dir(),
                ProviderSettings::LocalMusic { dir } => *dir = self.music_dir(),
                ProviderSettings::Archive { dir } => *dir = self.outputs_dir(),
                _ => {}
            }
        }
        config
    }
}

/// Replace the providers of one capability.
pub fn set_chain(config: &mut Config, capability: Capability, providers: Vec<ProviderConfig>) {
    config.providers.retain(|p| p.capability != capability);
    config.providers.extend(providers);
}

/// Writes a placeholder file at the requested output and reports the exact
/// target duration and resolution.
pub struct StubCompositor {
    pub calls: AtomicU32,
    pub seen_audio: std::sync::Mutex<Option<MediaFile>>,
}

impl StubCompositor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            seen_audio: std::sync::Mutex::new(None),
        })
    }
}

#[async_trait]
impl Compositor for StubCompositor {
    fn name(&self) -> &str {
        "stub"
    }

    async fn compose(&self, request: &CompositionRequest) -> shortforge_core::Result<MediaFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_audio.lock().unwrap() = request.audio.clone();
        tokio::fs::write(&request.output, b"composed").await?;
        Ok(MediaFile {
            path: request.output.clone(),
            kind: MediaKind::Video,
            size: 8,
            width: Some(request.target.width),
            height: Some(request.target.height),
            duration: Some(request.target.duration),
            owned: true,
        })
    }
}

/// Records what it was asked to publish.
pub struct RecordingPublisher {
    pub published: std::sync::Mutex<Vec<(PathBuf, PublishMetadata)>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            published: std::sync::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(
        &self,
        media: &MediaFile,
        metadata: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        if !media.path.exists() {
            return Err(PublishError::permanent("composed file is missing"));
        }
        self.published
            .lock()
            .unwrap()
            .push((media.path.clone(), metadata.clone()));
        Ok(PublishReceipt {
            id: "vid-123".into(),
            url: Some("https://youtu.be/vid-123".into()),
        })
    }
}
