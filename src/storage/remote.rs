use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::{ObjectStore, StorageKind, StoredImage};
use crate::error::{AppError, AppResult};

/// Bucket reachable over HTTP: objects are written with `PUT {base_url}/{key}`
/// and read back from the same address.
///
/// The token is sent as a bearer credential; do not log it.
#[derive(Debug, Clone)]
pub struct RemoteObjectStore {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteObjectStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for RemoteObjectStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Gcs
    }

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> AppResult<StoredImage> {
        let url = self.object_url(key);
        let mut request = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Upload(format!(
                "object store returned {}",
                response.status()
            )));
        }

        Ok(StoredImage {
            url,
            path: key.to_string(),
            storage: StorageKind::Gcs,
        })
    }

    fn download_url(&self, path: &str) -> String {
        self.object_url(path)
    }
}
