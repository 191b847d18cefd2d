//! Object storage for product images.
//!
//! Images are written under `product-images/<millis>_<filename>`. The value
//! persisted on a product is either an absolute URL, a data URI, or a storage
//! path; only storage paths need resolving before they can be fetched.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppResult;

pub mod local;
pub mod remote;

pub use local::LocalDiskStore;
pub use remote::RemoteObjectStore;

pub const IMAGE_PREFIX: &str = "product-images";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// The remote bucket.
    Gcs,
    /// The upload server's own disk.
    Local,
}

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredImage {
    pub url: String,
    pub path: String,
    pub storage: StorageKind,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Stores `bytes` under `key` and returns the stored location.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> AppResult<StoredImage>;

    /// Builds a fetchable URL for a previously stored path.
    fn download_url(&self, path: &str) -> String;
}

/// Object key for a freshly uploaded file.
pub fn image_key(filename: &str) -> String {
    format!("{IMAGE_PREFIX}/{}_{}", Utc::now().timestamp_millis(), sanitize_filename(filename))
}

/// Keeps the final path component and drops characters that would escape it.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Classification of a stored product image value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef<'a> {
    Url(&'a str),
    DataUri(&'a str),
    StoragePath(&'a str),
}

impl<'a> ImageRef<'a> {
    pub fn parse(value: &'a str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("data:") {
            ImageRef::DataUri(trimmed)
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ImageRef::Url(trimmed)
        } else {
            ImageRef::StoragePath(trimmed.trim_start_matches('/'))
        }
    }

    /// Resolves to a fetchable URL, asking the store only for storage paths.
    pub fn resolve(&self, store: &dyn ObjectStore) -> String {
        match self {
            ImageRef::Url(url) | ImageRef::DataUri(url) => (*url).to_string(),
            ImageRef::StoragePath(path) => store.download_url(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_urls_and_data_uris_pass_through() {
        assert_eq!(
            ImageRef::parse("https://cdn.example.com/a.png"),
            ImageRef::Url("https://cdn.example.com/a.png")
        );
        assert_eq!(
            ImageRef::parse("data:image/png;base64,AAAA"),
            ImageRef::DataUri("data:image/png;base64,AAAA")
        );
        assert_eq!(
            ImageRef::parse("product-images/1_milk.png"),
            ImageRef::StoragePath("product-images/1_milk.png")
        );
    }

    #[test]
    fn filenames_cannot_escape_the_prefix() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my milk.png"), "my_milk.png");
        assert_eq!(sanitize_filename(".."), "upload");
        assert!(image_key("cheese.jpg").starts_with("product-images/"));
        assert!(image_key("cheese.jpg").ends_with("_cheese.jpg"));
    }
}
