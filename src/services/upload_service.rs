use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    storage::{ObjectStore, StorageKind, StoredImage, image_key},
};

/// An image file picked by the admin or received by the upload server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    fn name(&self) -> &'static str;

    async fn upload(&self, image: &ImageUpload) -> AppResult<StoredImage>;
}

/// Writes straight into an object store under a fresh `product-images/` key.
pub struct DirectUploader {
    store: Arc<dyn ObjectStore>,
}

impl DirectUploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ImageUploader for DirectUploader {
    fn name(&self) -> &'static str {
        match self.store.kind() {
            StorageKind::Gcs => "object-store",
            StorageKind::Local => "local-disk",
        }
    }

    async fn upload(&self, image: &ImageUpload) -> AppResult<StoredImage> {
        if image.bytes.is_empty() {
            return Err(AppError::BadRequest("No file uploaded".into()));
        }
        let key = image_key(&image.filename);
        self.store
            .put(&key, &image.bytes, &image.content_type)
            .await
    }
}

#[derive(Deserialize)]
struct UploadReply {
    url: String,
    path: String,
    storage: StorageKind,
}

/// Sends the file to the upload server's `POST /upload` endpoint.
#[derive(Debug, Clone)]
pub struct UploadServerClient {
    http: reqwest::Client,
    base_url: String,
}

impl UploadServerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageUploader for UploadServerClient {
    fn name(&self) -> &'static str {
        "upload-server"
    }

    async fn upload(&self, image: &ImageUpload) -> AppResult<StoredImage> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.content_type)
            .map_err(|e| AppError::Upload(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Upload(format!(
                "upload server returned {}",
                response.status()
            )));
        }

        let reply: UploadReply = response
            .json()
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;
        Ok(StoredImage {
            url: reply.url,
            path: reply.path,
            storage: reply.storage,
        })
    }
}

/// Tries `primary`, then `secondary` when the primary transport fails.
pub struct FallbackUploader {
    primary: Arc<dyn ImageUploader>,
    secondary: Arc<dyn ImageUploader>,
}

impl FallbackUploader {
    pub fn new(primary: Arc<dyn ImageUploader>, secondary: Arc<dyn ImageUploader>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl ImageUploader for FallbackUploader {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn upload(&self, image: &ImageUpload) -> AppResult<StoredImage> {
        match self.primary.upload(image).await {
            Ok(stored) => Ok(stored),
            Err(AppError::BadRequest(message)) => Err(AppError::BadRequest(message)),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "upload failed, falling back"
                );
                self.secondary.upload(image).await
            }
        }
    }
}

/// The shopper-side uploader: straight to the bucket, then through the
/// upload server when the bucket cannot be reached.
pub fn session_uploader(
    bucket: Arc<dyn ObjectStore>,
    upload_server_url: &str,
) -> Arc<dyn ImageUploader> {
    Arc::new(FallbackUploader::new(
        Arc::new(DirectUploader::new(bucket)),
        Arc::new(UploadServerClient::new(upload_server_url)),
    ))
}
