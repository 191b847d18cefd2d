use std::{env, path::PathBuf};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Directory backing the local-disk fallback and `/static`.
    pub upload_dir: PathBuf,
    /// Base URL local uploads are served from.
    pub public_base_url: String,
    pub object_store_url: Option<String>,
    pub object_store_token: Option<String>,
    pub jwt_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .or_else(|_| env::var("PORT"))
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3001);
        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));
        Ok(Self {
            port,
            database_url,
            host,
            upload_dir,
            public_base_url,
            object_store_url: non_empty_var("OBJECT_STORE_URL"),
            object_store_token: non_empty_var("OBJECT_STORE_TOKEN"),
            jwt_secret: non_empty_var("JWT_SECRET"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
