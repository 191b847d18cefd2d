//! Bulk import of a JSON export into the backing store.
//!
//! Records are written one at a time, keeping their identifiers. A record
//! that cannot be parsed or written is logged and counted; the rest of the
//! import carries on.

use serde_json::Value;

use crate::{
    dto::migration::{Dataset, OrderDoc, ProductDoc, ReviewDoc, UserDoc},
    error::AppResult,
    models::UserRecord,
    services::auth_service::hash_password,
    store::BackingStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub collection: &'static str,
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub products: usize,
    pub users: usize,
    pub orders: usize,
    pub reviews: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.products + self.users + self.orders + self.reviews
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn import_product(store: &dyn BackingStore, doc: Value) -> AppResult<()> {
    let product = serde_json::from_value::<ProductDoc>(doc)
        .map_err(|e| anyhow::anyhow!(e))?
        .into_product()?;
    store.put_product(product).await?;
    Ok(())
}

async fn import_user(store: &dyn BackingStore, doc: Value) -> AppResult<()> {
    let doc = serde_json::from_value::<UserDoc>(doc).map_err(|e| anyhow::anyhow!(e))?;
    let role = doc.role()?;
    let password_hash = match (doc.password_hash, doc.password) {
        (Some(hash), _) => Some(hash),
        (None, Some(plain)) => Some(hash_password(&plain)?),
        (None, None) => None,
    };
    store
        .upsert_user(UserRecord {
            id: doc.id,
            username: doc.username,
            email: doc.email,
            role,
            password_hash,
        })
        .await?;
    Ok(())
}

async fn import_order(store: &dyn BackingStore, doc: Value) -> AppResult<()> {
    let order = serde_json::from_value::<OrderDoc>(doc)
        .map_err(|e| anyhow::anyhow!(e))?
        .into_order()?;
    store.put_order(order).await?;
    Ok(())
}

async fn import_review(store: &dyn BackingStore, doc: Value) -> AppResult<()> {
    let review = serde_json::from_value::<ReviewDoc>(doc)
        .map_err(|e| anyhow::anyhow!(e))?
        .into_review();
    store.put_review(review).await?;
    Ok(())
}

fn tally(
    failures: &mut Vec<ImportFailure>,
    collection: &'static str,
    index: usize,
    result: AppResult<()>,
) -> usize {
    match result {
        Ok(()) => 1,
        Err(err) => {
            tracing::error!(collection, index, error = %err, "failed to import item");
            failures.push(ImportFailure {
                collection,
                index,
                error: err.to_string(),
            });
            0
        }
    }
}

pub async fn import_dataset(store: &dyn BackingStore, dataset: Dataset) -> ImportReport {
    let mut report = ImportReport::default();
    let Dataset {
        products,
        users,
        orders,
        reviews,
    } = dataset;

    for (index, doc) in products.into_iter().enumerate() {
        let result = import_product(store, doc).await;
        report.products += tally(&mut report.failures, "products", index, result);
    }
    tracing::info!(imported = report.products, "products migrated");

    for (index, doc) in users.into_iter().enumerate() {
        let result = import_user(store, doc).await;
        report.users += tally(&mut report.failures, "users", index, result);
    }
    tracing::info!(imported = report.users, "users migrated");

    for (index, doc) in orders.into_iter().enumerate() {
        let result = import_order(store, doc).await;
        report.orders += tally(&mut report.failures, "orders", index, result);
    }
    tracing::info!(imported = report.orders, "orders migrated");

    for (index, doc) in reviews.into_iter().enumerate() {
        let result = import_review(store, doc).await;
        report.reviews += tally(&mut report.failures, "reviews", index, result);
    }
    tracing::info!(imported = report.reviews, "reviews migrated");

    report
}
