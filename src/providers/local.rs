//! Providers that pick from local asset directories.
//!
//! Picked files stay where they are; they are never owned by the run
//! workspace and are never deleted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use shortforge_core::{Capability, Payload, ProviderError};
use shortforge_pipeline::{ProviderClient, ResolveContext};
use walkdir::WalkDir;

use super::ProviderEnv;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a"];

/// Prompt words shorter than this never match file names.
const MIN_KEYWORD_LEN: usize = 3;

/// Regular files directly inside `dir` with one of `extensions`, sorted.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        })
        .collect();
    files.sort();
    files
}

/// Files whose name contains one of the prompt's words.
pub fn keyword_matches<'a>(files: &'a [PathBuf], prompt: &str) -> Vec<&'a PathBuf> {
    let words: Vec<String> = prompt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
        .map(str::to_lowercase)
        .collect();

    files
        .iter()
        .filter(|p| {
            let stem = p
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            words.iter().any(|w| stem.contains(w.as_str()))
        })
        .collect()
}

fn pick_image(files: &[PathBuf], prompt: &str) -> Option<PathBuf> {
    let mut rng = rand::thread_rng();
    let matched = keyword_matches(files, prompt);
    if let Some(hit) = matched.choose(&mut rng) {
        return Some((*hit).clone());
    }
    files.choose(&mut rng).cloned()
}

async fn scan(dir: PathBuf, extensions: &'static [&'static str]) -> Result<Vec<PathBuf>, ProviderError> {
    if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        return Err(ProviderError::unavailable(format!(
            "directory {} does not exist",
            dir.display()
        )));
    }
    tokio::task::spawn_blocking(move || list_files(&dir, extensions))
        .await
        .map_err(|e| ProviderError::transport(format!("directory scan failed: {e}")))
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

pub struct LocalImages {
    name: String,
    env: ProviderEnv,
    dir: PathBuf,
}

impl LocalImages {
    pub fn new(name: String, env: ProviderEnv, dir: PathBuf) -> Self {
        Self { name, env, dir }
    }
}

#[async_trait]
impl ProviderClient for LocalImages {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Visual
    }

    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        let files = scan(self.dir.clone(), IMAGE_EXTENSIONS).await?;
        let prompt = ctx.prompt().unwrap_or_default();
        let picked = pick_image(&files, prompt).ok_or_else(|| {
            ProviderError::unavailable(format!("no images in {}", self.dir.display()))
        })?;

        tracing::debug!(provider = %self.name, file = %picked.display(), "picked local image");
        Ok(Payload::Media(self.env.probe(&picked, false).await?))
    }
}

// ---------------------------------------------------------------------------
// Music
// ---------------------------------------------------------------------------

pub struct LocalMusic {
    name: String,
    env: ProviderEnv,
    dir: PathBuf,
}

impl LocalMusic {
    pub fn new(name: String, env: ProviderEnv, dir: PathBuf) -> Self {
        Self { name, env, dir }
    }
}

#[async_trait]
impl ProviderClient for LocalMusic {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Audio
    }

    /// Tracks are tried in random order; the first one long enough wins.
    async fn invoke(&self, ctx: &ResolveContext) -> Result<Payload, ProviderError> {
        let mut files = scan(self.dir.clone(), MUSIC_EXTENSIONS).await?;
        files.shuffle(&mut rand::thread_rng());

        for file in &files {
            match self.env.probe(file, false).await {
                Ok(media) if media.duration.is_some_and(|d| d >= ctx.target.duration) => {
                    tracing::debug!(provider = %self.name, file = %file.display(), "picked local track");
                    return Ok(Payload::Media(media));
                }
                Ok(media) => {
                    tracing::debug!(
                        file = %file.display(),
                        duration = ?media.duration,
                        "track too short, skipping"
                    );
                }
                Err(e) => {
                    tracing::debug!(file = %file.display(), error = %e, "unreadable track, skipping");
                }
            }
        }

        Err(ProviderError::unavailable(format!(
            "no track in {} lasts {}s",
            self.dir.display(),
            ctx.target.duration.as_secs()
        )))
    }
}
