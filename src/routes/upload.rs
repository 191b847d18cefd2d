use std::{collections::HashMap, str::FromStr};

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    routing::post,
};
use rust_decimal::Decimal;

use crate::{
    dto::upload::{CreateProductForm, CreatedProduct, UploadForm},
    error::{AppError, AppResult},
    models::{Category, NewProduct},
    response::ApiResponse,
    services::upload_service::ImageUpload,
    state::AppState,
    storage::StoredImage,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_image))
        .route("/create-product", post(create_product))
}

fn no_file() -> AppError {
    AppError::BadRequest("No file uploaded".into())
}

/// The `file` part plus every text field of a multipart body.
#[derive(Default)]
struct UploadParts {
    file: Option<ImageUpload>,
    fields: HashMap<String, String>,
}

impl UploadParts {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> AppResult<Self> {
        let mut multipart = multipart.map_err(|_| no_file())?;
        let mut parts = UploadParts::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                if !bytes.is_empty() {
                    parts.file = Some(ImageUpload::new(filename, content_type, bytes.to_vec()));
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                parts.fields.insert(name, value);
            }
        }
        Ok(parts)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = StoredImage),
        (status = 400, description = "No file uploaded"),
    ),
    tag = "Uploads"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ApiResponse<StoredImage>>> {
    let parts = UploadParts::read(multipart).await?;
    let file = parts.file.ok_or_else(no_file)?;

    let stored = state.uploader.upload(&file).await?;
    tracing::info!(path = %stored.path, storage = ?stored.storage, "image uploaded");
    Ok(Json(ApiResponse::success(stored)))
}

#[utoipa::path(
    post,
    path = "/create-product",
    request_body(content = CreateProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored and product created", body = CreatedProduct),
        (status = 400, description = "No file uploaded or unknown category"),
    ),
    tag = "Uploads"
)]
pub async fn create_product(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ApiResponse<CreatedProduct>>> {
    let parts = UploadParts::read(multipart).await?;
    let file = parts.file.as_ref().ok_or_else(no_file)?;
    let category = Category::from_str(parts.text("category").unwrap_or_default())?;

    let stored = state.uploader.upload(file).await?;
    let product = NewProduct {
        name: parts.text("name").unwrap_or("Untitled").to_string(),
        category,
        price: parts
            .text("price")
            .and_then(|p| Decimal::from_str(p).ok())
            .filter(|p| *p >= Decimal::ZERO)
            .unwrap_or(Decimal::ZERO),
        stock: parts
            .text("stock")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0),
        brand: parts.text("brand").unwrap_or_default().to_string(),
        description: parts.text("description").unwrap_or_default().to_string(),
        rating: Decimal::ZERO,
        image: stored.url,
    };

    let product = state.store.create_product(product).await?;
    tracing::info!(product_id = %product.id, "product created from upload");
    Ok(Json(ApiResponse::success(CreatedProduct {
        id: product.id.clone(),
        product,
    })))
}
