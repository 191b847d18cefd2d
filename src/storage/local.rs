use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tokio::fs;

use super::{ObjectStore, StorageKind, StoredImage, sanitize_filename};
use crate::error::AppResult;

/// Stores images on the upload server's disk, served back under `/static`.
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn static_url(&self, filename: &str) -> String {
        format!("{}/static/{}", self.public_base_url, filename)
    }

    /// Deletes regular files last modified more than `days` ago and returns their names.
    pub async fn purge_older_than(&self, days: u64) -> AppResult<Vec<String>> {
        self.ensure_root().await?;
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(days.saturating_mul(24 * 3600)))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.purge_modified_before(cutoff).await
    }

    pub async fn purge_modified_before(&self, cutoff: SystemTime) -> AppResult<Vec<String>> {
        let mut removed = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            if metadata.modified()? < cutoff {
                fs::remove_file(entry.path()).await?;
                removed.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        removed.sort();
        tracing::info!(count = removed.len(), "purged old uploads");
        Ok(removed)
    }
}

#[async_trait]
impl ObjectStore for LocalDiskStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> AppResult<StoredImage> {
        self.ensure_root().await?;
        let filename = sanitize_filename(key);
        fs::write(self.root.join(&filename), bytes).await?;
        Ok(StoredImage {
            url: self.static_url(&filename),
            path: format!("local/{filename}"),
            storage: StorageKind::Local,
        })
    }

    fn download_url(&self, path: &str) -> String {
        let filename = path.strip_prefix("local/").unwrap_or(path);
        self.static_url(&sanitize_filename(filename))
    }
}
