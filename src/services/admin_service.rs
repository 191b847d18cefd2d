//! Admin Mutation Panel.
//!
//! Product creation with an image is optimistic: a `Pending` row is shown
//! while the upload and the store write are in flight. A store failure after a
//! successful upload turns the row into `Failed(RetryCommand)`, which hides it
//! and keeps the exact payload for a later retry. Once a retry commits, the
//! record answers further retries with the same product until the admin
//! discards it. Edits are never optimistic.

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, FieldError},
    models::{Category, NewProduct, Order, OrderStatus, Product, ProductPatch, Role},
    services::{
        product_service::CatalogStore,
        upload_service::{ImageUpload, ImageUploader},
    },
    store::BackingStore,
};

pub const PLACEHOLDER_IMAGE: &str = "placeholder.jpg";

/// Raw admin form input, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub category: String,
    pub price: String,
    pub stock: String,
    pub brand: String,
    pub description: String,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub name: String,
    pub category: Category,
    pub price: Decimal,
    pub stock: u32,
    pub brand: String,
    pub description: String,
}

impl ProductForm {
    /// Checks every field and reports all offending ones at once.
    pub fn validate(&self) -> Result<ProductFields, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }
        let brand = self.brand.trim();
        if brand.is_empty() {
            errors.push(FieldError::new("brand", "Brand is required"));
        }

        let category = if self.category.trim().is_empty() {
            errors.push(FieldError::new("category", "Category is required"));
            None
        } else {
            match Category::from_str(&self.category) {
                Ok(category) => Some(category),
                Err(_) => {
                    errors.push(FieldError::new("category", "Unknown category"));
                    None
                }
            }
        };

        let price = match Decimal::from_str(self.price.trim()) {
            Ok(price) if price >= Decimal::ZERO => Some(price),
            Ok(_) => {
                errors.push(FieldError::new("price", "Price cannot be negative"));
                None
            }
            Err(_) => {
                errors.push(FieldError::new("price", "Price must be a number"));
                None
            }
        };

        let stock = match self.stock.trim().parse::<i64>() {
            Ok(stock) if stock < 0 => {
                errors.push(FieldError::new("stock", "Stock cannot be negative"));
                None
            }
            Ok(stock) => match u32::try_from(stock) {
                Ok(stock) => Some(stock),
                Err(_) => {
                    errors.push(FieldError::new("stock", "Stock is too large"));
                    None
                }
            },
            Err(_) => {
                errors.push(FieldError::new("stock", "Stock must be a whole number"));
                None
            }
        };

        match (category, price, stock) {
            (Some(category), Some(price), Some(stock)) if errors.is_empty() => Ok(ProductFields {
                name: name.to_string(),
                category,
                price,
                stock,
                brand: brand.to_string(),
                description: self.description.trim().to_string(),
            }),
            _ => Err(errors),
        }
    }
}

impl ProductFields {
    fn into_new_product(self, image: String) -> NewProduct {
        NewProduct {
            name: self.name,
            category: self.category,
            price: self.price,
            stock: self.stock,
            brand: self.brand,
            description: self.description,
            rating: Decimal::ZERO,
            image,
        }
    }

    fn into_patch(self, image: Option<String>) -> ProductPatch {
        ProductPatch {
            name: Some(self.name),
            category: Some(self.category),
            price: Some(self.price),
            stock: Some(self.stock),
            brand: Some(self.brand),
            description: Some(self.description),
            image,
        }
    }
}

/// A product write that failed, kept so it can be re-run with the same payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryCommand {
    pub key: Uuid,
    pub payload: NewProduct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Committed(Product),
    Failed(RetryCommand),
}

/// A product created from this session, tracked until the catalog shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecord {
    pub key: Uuid,
    pub draft: NewProduct,
    pub state: RecordState,
    /// Set once a retry was offered for this key.
    pub retryable: bool,
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Product),
    /// The store rejected the write; the retry command replays it.
    Failed { retry: RetryCommand, error: AppError },
}

/// One line of the admin products table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRow {
    pub product: Product,
    pub pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analytics {
    pub total_orders: usize,
    pub revenue: Decimal,
    pub product_count: usize,
    pub customer_count: usize,
}

#[derive(Debug, Default)]
pub struct AdminPanel {
    records: Vec<LocalRecord>,
}

impl AdminPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LocalRecord] {
        &self.records
    }

    pub fn record(&self, key: Uuid) -> Option<&LocalRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub async fn create_product(
        &mut self,
        store: &dyn BackingStore,
        uploader: &dyn ImageUploader,
        form: &ProductForm,
        image: Option<ImageUpload>,
    ) -> AppResult<CreateOutcome> {
        let fields = form.validate().map_err(AppError::Validation)?;
        let key = Uuid::new_v4();

        let payload = match image {
            Some(image) => {
                self.records.push(LocalRecord {
                    key,
                    draft: fields.clone().into_new_product(PLACEHOLDER_IMAGE.to_string()),
                    state: RecordState::Pending,
                    retryable: false,
                });
                match uploader.upload(&image).await {
                    Ok(stored) => fields.into_new_product(stored.url),
                    Err(err) => {
                        self.records.retain(|r| r.key != key);
                        tracing::error!(error = %err, uploader = uploader.name(), "image upload failed");
                        return Err(match err {
                            AppError::BadRequest(_) => err,
                            other => AppError::Upload(other.to_string()),
                        });
                    }
                }
            }
            None => fields.into_new_product(PLACEHOLDER_IMAGE.to_string()),
        };

        Ok(self.run(store, RetryCommand { key, payload }).await)
    }

    /// Replays a failed create. A command that already committed returns the
    /// committed product without writing again.
    pub async fn retry(&mut self, store: &dyn BackingStore, key: Uuid) -> AppResult<CreateOutcome> {
        let command = match self.record(key).map(|r| &r.state) {
            Some(RecordState::Failed(command)) => command.clone(),
            Some(RecordState::Committed(product)) => return Ok(CreateOutcome::Created(product.clone())),
            Some(RecordState::Pending) => {
                return Err(AppError::BadRequest("Product save is still in progress".into()));
            }
            None => return Err(AppError::NotFound),
        };
        Ok(self.run(store, command).await)
    }

    /// Drops a retry command the admin no longer wants, whether it is still
    /// failing or has since committed.
    pub fn discard(&mut self, key: Uuid) -> bool {
        let before = self.records.len();
        self.records.retain(|r| {
            !(r.key == key
                && r.retryable
                && matches!(r.state, RecordState::Failed(_) | RecordState::Committed(_)))
        });
        self.records.len() != before
    }

    async fn run(&mut self, store: &dyn BackingStore, command: RetryCommand) -> CreateOutcome {
        if let Some(record) = self.record_mut(command.key) {
            record.state = RecordState::Pending;
        }

        match store.create_product(command.payload.clone()).await {
            Ok(product) => {
                tracing::info!(product_id = %product.id, key = %command.key, "product created");
                if let Some(record) = self.record_mut(command.key) {
                    record.state = RecordState::Committed(product.clone());
                }
                CreateOutcome::Created(product)
            }
            Err(error) => {
                tracing::error!(error = %error, key = %command.key, "product write failed");
                let failed = RecordState::Failed(command.clone());
                match self.record_mut(command.key) {
                    Some(record) => {
                        record.state = failed;
                        record.retryable = true;
                    }
                    None => self.records.push(LocalRecord {
                        key: command.key,
                        draft: command.payload.clone(),
                        state: failed,
                        retryable: true,
                    }),
                }
                CreateOutcome::Failed {
                    retry: command,
                    error,
                }
            }
        }
    }

    fn record_mut(&mut self, key: Uuid) -> Option<&mut LocalRecord> {
        self.records.iter_mut().find(|r| r.key == key)
    }

    /// Forgets committed creates the catalog now shows on its own, and
    /// committed retries whose product has left the catalog.
    pub fn reconcile(&mut self, catalog: &CatalogStore) {
        self.records.retain(|r| match &r.state {
            RecordState::Committed(product) => {
                catalog.product(&product.id).is_some() == r.retryable
            }
            _ => true,
        });
    }

    /// Catalog products followed by this session's not-yet-fetched rows.
    /// Failed creates are hidden.
    pub fn display_rows(&self, catalog: &CatalogStore) -> Vec<AdminRow> {
        let mut rows: Vec<AdminRow> = catalog
            .products()
            .iter()
            .map(|product| AdminRow {
                product: product.clone(),
                pending: false,
            })
            .collect();

        for record in &self.records {
            match &record.state {
                RecordState::Pending => rows.push(AdminRow {
                    product: record.draft.clone().into_product(format!("pending-{}", record.key)),
                    pending: true,
                }),
                RecordState::Committed(product) if catalog.product(&product.id).is_none() => {
                    rows.push(AdminRow {
                        product: product.clone(),
                        pending: false,
                    })
                }
                RecordState::Committed(_) | RecordState::Failed(_) => {}
            }
        }
        rows
    }
}

/// Updates an existing product once the store confirms. Without a new image
/// the stored image is left as it is.
pub async fn edit_product(
    store: &dyn BackingStore,
    uploader: &dyn ImageUploader,
    id: &str,
    form: &ProductForm,
    image: Option<ImageUpload>,
) -> AppResult<Product> {
    let fields = form.validate().map_err(AppError::Validation)?;
    let image = match image {
        Some(image) => Some(uploader.upload(&image).await?.url),
        None => None,
    };
    let product = store.update_product(id, fields.into_patch(image)).await?;
    tracing::info!(product_id = %product.id, "product updated");
    Ok(product)
}

pub async fn delete_product(store: &dyn BackingStore, id: &str) -> AppResult<()> {
    store.delete_product(id).await?;
    tracing::info!(product_id = %id, "product deleted");
    Ok(())
}

pub async fn update_order_status(
    store: &dyn BackingStore,
    id: &str,
    status: OrderStatus,
) -> AppResult<Order> {
    let order = store.update_order_status(id, status).await?;
    tracing::info!(order_id = %id, status = %status, "order status updated");
    Ok(order)
}

pub fn analytics(catalog: &CatalogStore) -> Analytics {
    Analytics {
        total_orders: catalog.orders().len(),
        revenue: catalog.orders().iter().map(|o| o.total).sum(),
        product_count: catalog.products().len(),
        customer_count: catalog
            .users()
            .iter()
            .filter(|u| u.role == Role::Customer)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        services::upload_service::DirectUploader,
        storage::local::LocalDiskStore,
        store::memory::{MemoryStore, StoreOp},
    };

    fn form() -> ProductForm {
        ProductForm {
            name: "Greek Yogurt".into(),
            category: "yogurt".into(),
            price: "4.49".into(),
            stock: "30".into(),
            brand: "Olympus".into(),
            description: "Thick and creamy".into(),
        }
    }

    #[test]
    fn valid_form_parses() {
        let fields = form().validate().unwrap();
        assert_eq!(fields.category, Category::Yogurt);
        assert_eq!(fields.price, Decimal::new(449, 2));
        assert_eq!(fields.stock, 30);
    }

    #[test]
    fn every_bad_field_is_reported() {
        let bad = ProductForm {
            name: "  ".into(),
            category: "soda".into(),
            price: "abc".into(),
            stock: "-1".into(),
            brand: String::new(),
            description: String::new(),
        };
        let fields: Vec<_> = bad
            .validate()
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, ["name", "brand", "category", "price", "stock"]);
    }

    #[test]
    fn fractional_stock_is_rejected() {
        let mut f = form();
        f.stock = "2.5".into();
        assert_eq!(f.validate().unwrap_err()[0].field, "stock");
    }

    fn uploader() -> DirectUploader {
        DirectUploader::new(Arc::new(LocalDiskStore::new(
            std::env::temp_dir().join("dairyhub-admin-tests"),
            "http://localhost:3001",
        )))
    }

    #[tokio::test]
    async fn create_without_image_keeps_no_local_record() {
        let store = MemoryStore::new();
        let mut panel = AdminPanel::new();

        let outcome = panel.create_product(&store, &uploader(), &form(), None).await.unwrap();
        let CreateOutcome::Created(product) = outcome else {
            panic!("expected the product to be created");
        };
        assert_eq!(product.image, PLACEHOLDER_IMAGE);
        assert!(panel.records().is_empty());
    }

    #[tokio::test]
    async fn failed_create_without_image_records_only_the_failure() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::ProductWrite, 1);
        let mut panel = AdminPanel::new();

        let outcome = panel.create_product(&store, &uploader(), &form(), None).await.unwrap();
        let CreateOutcome::Failed { retry, .. } = outcome else {
            panic!("expected the write to fail");
        };
        assert_eq!(panel.records().len(), 1);
        let record = panel.record(retry.key).unwrap();
        assert!(record.retryable);
        assert!(matches!(record.state, RecordState::Failed(_)));
    }

    #[tokio::test]
    async fn committed_retry_is_kept_until_discarded_or_deleted() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::ProductWrite, 1);
        let mut panel = AdminPanel::new();
        let mut catalog = CatalogStore::new();

        let outcome = panel.create_product(&store, &uploader(), &form(), None).await.unwrap();
        let CreateOutcome::Failed { retry, .. } = outcome else {
            panic!("expected the write to fail");
        };
        let CreateOutcome::Created(created) = panel.retry(&store, retry.key).await.unwrap() else {
            panic!("expected the retry to commit");
        };

        catalog.refresh(&store).await.unwrap();
        panel.reconcile(&catalog);
        let CreateOutcome::Created(again) = panel.retry(&store, retry.key).await.unwrap() else {
            panic!("expected the committed product back");
        };
        assert_eq!(again.id, created.id);
        assert_eq!(store.fetch_products().await.unwrap().len(), 1);

        store.delete_product(&created.id).await.unwrap();
        catalog.refresh(&store).await.unwrap();
        panel.reconcile(&catalog);
        assert!(panel.records().is_empty());
        assert!(matches!(panel.retry(&store, retry.key).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn discarding_a_committed_retry_forgets_it() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::ProductWrite, 1);
        let mut panel = AdminPanel::new();

        let outcome = panel.create_product(&store, &uploader(), &form(), None).await.unwrap();
        let CreateOutcome::Failed { retry, .. } = outcome else {
            panic!("expected the write to fail");
        };
        panel.retry(&store, retry.key).await.unwrap();

        assert!(panel.discard(retry.key));
        assert!(panel.records().is_empty());
        assert!(!panel.discard(retry.key));
    }
}
