//! The remote document store holding the authoritative collections.
//!
//! Every collection is returned in a stable order so two fetches with no
//! intervening write produce identical snapshots.

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        NewProduct, NewReview, Order, OrderStatus, Product, ProductPatch, Review, User,
        UserCredentials, UserRecord,
    },
};

pub mod memory;
pub mod orm;

pub use memory::MemoryStore;
pub use orm::OrmStore;

#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn fetch_products(&self) -> AppResult<Vec<Product>>;
    async fn fetch_users(&self) -> AppResult<Vec<User>>;
    async fn fetch_orders(&self) -> AppResult<Vec<Order>>;
    async fn fetch_reviews(&self) -> AppResult<Vec<Review>>;

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>>;

    /// Inserts a new user, or replaces the profile when `record.id` already exists.
    async fn upsert_user(&self, record: UserRecord) -> AppResult<User>;

    async fn create_product(&self, product: NewProduct) -> AppResult<Product>;

    /// Writes a product under a caller-chosen identifier, replacing any existing one.
    async fn put_product(&self, product: Product) -> AppResult<Product>;

    async fn update_product(&self, id: &str, patch: ProductPatch) -> AppResult<Product>;
    async fn delete_product(&self, id: &str) -> AppResult<()>;

    /// Writes the order and decrements stock for each line as one atomic unit.
    ///
    /// Fails with `InsufficientStock` without writing anything when any line
    /// asks for more than the product currently holds.
    async fn place_order(&self, order: Order) -> AppResult<Order>;

    /// Writes an order as-is, without touching stock. Used by imports.
    async fn put_order(&self, order: Order) -> AppResult<Order>;

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> AppResult<Order>;

    async fn create_review(&self, review: NewReview) -> AppResult<Review>;
    async fn put_review(&self, review: Review) -> AppResult<Review>;
}

/// Total quantity an order asks of each product, in order of first appearance.
pub fn requested_stock(order: &Order) -> Vec<(&str, u32)> {
    let mut totals: Vec<(&str, u32)> = Vec::new();
    for line in &order.items {
        match totals.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, total)) => *total = total.saturating_add(line.quantity),
            None => totals.push((&line.product_id, line.quantity)),
        }
    }
    totals
}

/// Allocates an opaque document identifier.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
