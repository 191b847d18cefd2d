use std::{sync::Arc, time::Instant};

use crate::{
    config::AppConfig,
    services::upload_service::{DirectUploader, FallbackUploader, ImageUploader},
    storage::{LocalDiskStore, ObjectStore, RemoteObjectStore},
    store::BackingStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BackingStore>,
    /// Remote bucket first when configured, local disk otherwise or on failure.
    pub uploader: Arc<dyn ImageUploader>,
    pub local: Arc<LocalDiskStore>,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn BackingStore>, config: AppConfig) -> Self {
        let local = Arc::new(LocalDiskStore::new(
            config.upload_dir.clone(),
            config.public_base_url.clone(),
        ));
        let local_uploader: Arc<dyn ImageUploader> =
            Arc::new(DirectUploader::new(local.clone() as Arc<dyn ObjectStore>));

        let uploader = match &config.object_store_url {
            Some(url) => {
                let remote: Arc<dyn ObjectStore> = Arc::new(RemoteObjectStore::new(
                    url.clone(),
                    config.object_store_token.clone(),
                ));
                Arc::new(FallbackUploader::new(
                    Arc::new(DirectUploader::new(remote)),
                    local_uploader,
                )) as Arc<dyn ImageUploader>
            }
            None => local_uploader,
        };

        Self {
            store,
            uploader,
            local,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}
