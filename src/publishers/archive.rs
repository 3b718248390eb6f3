//! Publishes by copying the short into a local output directory.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use shortforge_core::{MediaFile, PublishReceipt};
use shortforge_pipeline::{PublishError, PublishMetadata, Publisher};

pub struct ArchivePublisher {
    dir: PathBuf,
}

impl ArchivePublisher {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_name(media: &MediaFile) -> String {
        let ext = media
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        format!("short_{}.{ext}", Utc::now().format("%Y%m%d_%H%M%S_%3f"))
    }
}

#[async_trait]
impl Publisher for ArchivePublisher {
    fn name(&self) -> &str {
        "archive"
    }

    async fn publish(
        &self,
        media: &MediaFile,
        metadata: &PublishMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            PublishError::permanent(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let name = Self::file_name(media);
        let dest = self.dir.join(&name);
        tokio::fs::copy(&media.path, &dest).await.map_err(|e| {
            PublishError::permanent(format!(
                "cannot copy {} to {}: {e}",
                media.path.display(),
                dest.display()
            ))
        })?;

        tracing::info!(file = %dest.display(), title = %metadata.title, "short archived");
        Ok(PublishReceipt {
            id: name,
            url: Some(dest.display().to_string()),
        })
    }
}
