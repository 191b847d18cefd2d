//! Catalog Store: the session's read cache of the remote collections.
//!
//! The cache is rebuilt wholesale after every mutation; there is no
//! per-record coherency.

use std::cmp::Ordering;

use crate::{
    dto::catalog::{ProductQuery, ProductSort},
    error::AppResult,
    models::{Category, Order, Product, Review, User},
    store::BackingStore,
};

pub const UNKNOWN_PRODUCT: &str = "Unknown Product";
/// Shown for review authors whose profile is gone.
pub const ANONYMOUS: &str = "Anonymous";
/// Shown for order owners whose profile is gone.
pub const UNKNOWN_USER: &str = "Unknown";
const FEATURED_COUNT: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub products: Vec<Product>,
    pub users: Vec<User>,
    pub orders: Vec<Order>,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    snapshot: CatalogSnapshot,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    /// Refetches every collection. The previous snapshot is kept if any fetch fails.
    pub async fn refresh(&mut self, store: &dyn BackingStore) -> AppResult<()> {
        let (products, users, orders, reviews) = tokio::try_join!(
            store.fetch_products(),
            store.fetch_users(),
            store.fetch_orders(),
            store.fetch_reviews(),
        )?;
        self.snapshot = CatalogSnapshot {
            products,
            users,
            orders,
            reviews,
        };
        tracing::debug!(
            products = self.snapshot.products.len(),
            orders = self.snapshot.orders.len(),
            "catalog refreshed"
        );
        Ok(())
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    pub fn products(&self) -> &[Product] {
        &self.snapshot.products
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.snapshot.products.iter().find(|p| p.id == id)
    }

    pub fn categories(&self) -> &'static [Category] {
        &Category::ALL
    }

    pub fn featured(&self) -> &[Product] {
        let end = self.snapshot.products.len().min(FEATURED_COUNT);
        &self.snapshot.products[..end]
    }

    /// Distinct brands in catalog order.
    pub fn brands(&self) -> Vec<&str> {
        let mut brands: Vec<&str> = Vec::new();
        for product in &self.snapshot.products {
            if !brands.contains(&product.brand.as_str()) {
                brands.push(&product.brand);
            }
        }
        brands
    }

    pub fn query(&self, query: &ProductQuery) -> ProductPage {
        let term = query
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let brand = query.brand.as_deref().filter(|b| !b.is_empty());

        let mut matches: Vec<&Product> = self
            .snapshot
            .products
            .iter()
            .filter(|p| query.category.is_none_or(|c| p.category == c))
            .filter(|p| brand.is_none_or(|b| p.brand == b))
            .filter(|p| query.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| query.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| {
                term.as_deref().is_none_or(|t| {
                    p.name.to_lowercase().contains(t)
                        || p.description.to_lowercase().contains(t)
                        || p.brand.to_lowercase().contains(t)
                })
            })
            .collect();

        matches.sort_by(|a, b| compare(a, b, query.sort));

        let total = matches.len();
        let (page, per_page, offset) = query.pagination.normalize();
        let items = matches
            .into_iter()
            .skip(offset)
            .take(per_page)
            .cloned()
            .collect();

        ProductPage {
            items,
            total,
            page,
            total_pages: total.div_ceil(per_page),
        }
    }

    pub fn reviews_for(&self, product_id: &str) -> Vec<&Review> {
        self.snapshot
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .collect()
    }

    pub fn orders_for(&self, user_id: &str) -> Vec<&Order> {
        self.snapshot
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .collect()
    }

    pub fn orders(&self) -> &[Order] {
        &self.snapshot.orders
    }

    pub fn users(&self) -> &[User] {
        &self.snapshot.users
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.snapshot.users.iter().find(|u| u.id == id)
    }

    pub fn username_or<'a>(&'a self, id: &str, fallback: &'a str) -> &'a str {
        self.user(id).map_or(fallback, |u| u.username.as_str())
    }

    /// Product name for display; orders may outlive the products they reference.
    pub fn product_name(&self, id: &str) -> &str {
        self.product(id).map_or(UNKNOWN_PRODUCT, |p| p.name.as_str())
    }
}

fn compare(a: &Product, b: &Product, sort: ProductSort) -> Ordering {
    match sort {
        ProductSort::PriceLow => a.price.cmp(&b.price),
        ProductSort::PriceHigh => b.price.cmp(&a.price),
        ProductSort::Rating => b.rating.cmp(&a.rating),
        ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    }
}
