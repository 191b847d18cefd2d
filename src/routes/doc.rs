use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiDocument,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::UserProfileRequest,
        upload::{CreateProductForm, CreatedProduct, HealthData, PurgeReport, UploadForm, UserProfile},
    },
    models::{Category, Product, Role, User},
    routes::{health, maintenance, upload, users},
    storage::{StorageKind, StoredImage},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        upload::upload_image,
        upload::create_product,
        maintenance::purge_old_uploads,
        users::upsert_profile
    ),
    components(
        schemas(
            Category,
            Product,
            Role,
            User,
            StorageKind,
            StoredImage,
            UploadForm,
            CreateProductForm,
            CreatedProduct,
            PurgeReport,
            HealthData,
            UserProfile,
            UserProfileRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Uploads", description = "Image upload with local-disk fallback"),
        (name = "Maintenance", description = "Local upload housekeeping"),
        (name = "Users", description = "Profile sync for signed-in clients"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiDocument> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
