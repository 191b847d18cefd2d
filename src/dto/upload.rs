use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{Product, User};

const DEFAULT_PURGE_DAYS: u64 = 30;

/// Multipart body of `POST /upload`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Multipart body of `POST /create-product`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreateProductForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub name: Option<String>,
    pub category: String,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedProduct {
    pub id: String,
    pub product: Product,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct PurgeQuery {
    /// Age in days; missing, zero or unparsable values mean 30.
    pub days: Option<String>,
}

impl PurgeQuery {
    pub fn days(&self) -> u64 {
        self.days
            .as_deref()
            .and_then(|d| d.trim().parse::<u64>().ok())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_PURGE_DAYS)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub removed_count: usize,
    pub removed: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthData {
    pub ok: bool,
    /// Seconds since the server started.
    pub uptime: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfile {
    pub user: User,
}
