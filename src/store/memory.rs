use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{BackingStore, new_document_id, requested_stock};
use crate::{
    error::{AppError, AppResult},
    models::{
        NewProduct, NewReview, Order, OrderStatus, Product, ProductPatch, Review, User,
        UserCredentials, UserRecord,
    },
};

/// Write paths that can be told to fail, for offline demos and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ProductWrite,
    OrderWrite,
    UserWrite,
    ReviewWrite,
    Fetch,
}

#[derive(Default)]
struct Collections {
    products: Vec<Product>,
    users: Vec<(User, Option<String>)>,
    orders: Vec<Order>,
    reviews: Vec<Review>,
    failures: HashMap<StoreOp, usize>,
    writes: usize,
}

impl Collections {
    fn check(&mut self, op: StoreOp) -> AppResult<()> {
        if let Some(remaining) = self.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::Unavailable(format!("{op:?} rejected")));
            }
        }
        if op != StoreOp::Fetch {
            self.writes += 1;
        }
        Ok(())
    }

    fn product_mut(&mut self, id: &str) -> AppResult<&mut Product> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::NotFound)
    }
}

/// Process-local document store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        let store = Self::new();
        store.data().products = products;
        store
    }

    /// Makes the next `times` calls of `op` fail with a transient error.
    pub fn fail_next(&self, op: StoreOp, times: usize) {
        self.data().failures.insert(op, times);
    }

    /// Number of successful writes applied so far.
    pub fn write_count(&self) -> usize {
        self.data().writes
    }

    fn data(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn fetch_products(&self) -> AppResult<Vec<Product>> {
        let mut data = self.data();
        data.check(StoreOp::Fetch)?;
        Ok(data.products.clone())
    }

    async fn fetch_users(&self) -> AppResult<Vec<User>> {
        let mut data = self.data();
        data.check(StoreOp::Fetch)?;
        Ok(data.users.iter().map(|(user, _)| user.clone()).collect())
    }

    async fn fetch_orders(&self) -> AppResult<Vec<Order>> {
        let mut data = self.data();
        data.check(StoreOp::Fetch)?;
        Ok(data.orders.clone())
    }

    async fn fetch_reviews(&self) -> AppResult<Vec<Review>> {
        let mut data = self.data();
        data.check(StoreOp::Fetch)?;
        Ok(data.reviews.clone())
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let mut data = self.data();
        data.check(StoreOp::Fetch)?;
        Ok(data
            .users
            .iter()
            .find(|(user, _)| user.email.eq_ignore_ascii_case(email))
            .map(|(user, hash)| UserCredentials {
                user: user.clone(),
                password_hash: hash.clone(),
            }))
    }

    async fn upsert_user(&self, record: UserRecord) -> AppResult<User> {
        let mut data = self.data();
        data.check(StoreOp::UserWrite)?;
        let id = record.id.unwrap_or_else(new_document_id);
        let user = User {
            id: id.clone(),
            username: record.username,
            email: record.email,
            role: record.role,
        };
        match data.users.iter_mut().find(|(u, _)| u.id == id) {
            Some(existing) => {
                let hash = record.password_hash.or_else(|| existing.1.take());
                *existing = (user.clone(), hash);
            }
            None => {
                let clash = data.users.iter().any(|(u, _)| {
                    u.email.eq_ignore_ascii_case(&user.email) || u.username == user.username
                });
                if clash {
                    return Err(AppError::Auth("Username or email already exists".into()));
                }
                data.users.push((user.clone(), record.password_hash));
            }
        }
        Ok(user)
    }

    async fn create_product(&self, product: NewProduct) -> AppResult<Product> {
        let mut data = self.data();
        data.check(StoreOp::ProductWrite)?;
        let product = product.into_product(new_document_id());
        data.products.push(product.clone());
        Ok(product)
    }

    async fn put_product(&self, product: Product) -> AppResult<Product> {
        let mut data = self.data();
        data.check(StoreOp::ProductWrite)?;
        match data.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product.clone(),
            None => data.products.push(product.clone()),
        }
        Ok(product)
    }

    async fn update_product(&self, id: &str, patch: ProductPatch) -> AppResult<Product> {
        let mut data = self.data();
        data.check(StoreOp::ProductWrite)?;
        let product = data.product_mut(id)?;
        patch.apply(product);
        Ok(product.clone())
    }

    async fn delete_product(&self, id: &str) -> AppResult<()> {
        let mut data = self.data();
        data.check(StoreOp::ProductWrite)?;
        let before = data.products.len();
        data.products.retain(|p| p.id != id);
        if data.products.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn place_order(&self, order: Order) -> AppResult<Order> {
        let mut data = self.data();
        data.check(StoreOp::OrderWrite)?;

        let requested = requested_stock(&order);
        for &(product_id, quantity) in &requested {
            let product = data.product_mut(product_id)?;
            if product.stock < quantity {
                return Err(AppError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available: product.stock,
                    requested: quantity,
                });
            }
        }
        for &(product_id, quantity) in &requested {
            let product = data.product_mut(product_id)?;
            product.stock = product.stock.checked_sub(quantity).ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("stock for {product_id} changed mid-commit"))
            })?;
        }
        data.orders.push(order.clone());
        Ok(order)
    }

    async fn put_order(&self, order: Order) -> AppResult<Order> {
        let mut data = self.data();
        data.check(StoreOp::OrderWrite)?;
        match data.orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order.clone(),
            None => data.orders.push(order.clone()),
        }
        Ok(order)
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> AppResult<Order> {
        let mut data = self.data();
        data.check(StoreOp::OrderWrite)?;
        let order = data
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(AppError::NotFound)?;
        order.status = status;
        Ok(order.clone())
    }

    async fn create_review(&self, review: NewReview) -> AppResult<Review> {
        let mut data = self.data();
        data.check(StoreOp::ReviewWrite)?;
        let review = Review {
            id: new_document_id(),
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment,
            date: review.date,
        };
        data.reviews.push(review.clone());
        Ok(review)
    }

    async fn put_review(&self, review: Review) -> AppResult<Review> {
        let mut data = self.data();
        data.check(StoreOp::ReviewWrite)?;
        match data.reviews.iter_mut().find(|r| r.id == review.id) {
            Some(existing) => *existing = review.clone(),
            None => data.reviews.push(review.clone()),
        }
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{Category, OrderItem};

    fn milk(stock: u32) -> Product {
        Product {
            id: "1".into(),
            name: "Fresh Whole Milk".into(),
            category: Category::Milk,
            price: Decimal::new(399, 2),
            stock,
            brand: "Dairy Farm".into(),
            description: "Farm fresh whole milk".into(),
            rating: Decimal::new(45, 1),
            image: "milk1.jpg".into(),
        }
    }

    fn order(quantity: u32) -> Order {
        Order {
            id: "ORD1".into(),
            user_id: "2".into(),
            status: OrderStatus::Processing,
            total: Decimal::new(399, 2) * Decimal::from(quantity),
            date: NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(),
            items: vec![OrderItem {
                product_id: "1".into(),
                quantity,
                price: Decimal::new(399, 2),
            }],
        }
    }

    #[tokio::test]
    async fn place_order_decrements_stock() {
        let store = MemoryStore::with_products(vec![milk(5)]);
        store.place_order(order(2)).await.unwrap();

        let products = store.fetch_products().await.unwrap();
        assert_eq!(products[0].stock, 3);
        assert_eq!(store.fetch_orders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn place_order_with_insufficient_stock_writes_nothing() {
        let store = MemoryStore::with_products(vec![milk(1)]);
        let err = store.place_order(order(2)).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { available: 1, requested: 2, .. }));
        assert_eq!(store.fetch_products().await.unwrap()[0].stock, 1);
        assert!(store.fetch_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_lines_are_checked_against_their_sum() {
        let store = MemoryStore::with_products(vec![milk(5)]);
        let mut twice = order(3);
        twice.items.push(twice.items[0].clone());

        let err = store.place_order(twice).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { available: 5, requested: 6, .. }));
        assert_eq!(store.fetch_products().await.unwrap()[0].stock, 5);
        assert!(store.fetch_orders().await.unwrap().is_empty());

        let mut split = order(2);
        split.items.push(split.items[0].clone());
        store.place_order(split).await.unwrap();
        assert_eq!(store.fetch_products().await.unwrap()[0].stock, 1);
    }

    #[tokio::test]
    async fn injected_failure_is_consumed() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Fetch, 1);

        assert!(store.fetch_products().await.is_err());
        assert!(store.fetch_products().await.is_ok());
    }
}
