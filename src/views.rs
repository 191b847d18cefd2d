//! Pure projections of session state into display-ready values.

use chrono::NaiveDate;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;

use crate::{
    dto::catalog::ProductQuery,
    models::{Order, Product, Review},
    services::{
        admin_service::{AdminRow, Analytics},
        cart_service::{self, CartLedger, SHIPPING_FEE},
        product_service::{ANONYMOUS, CatalogStore, UNKNOWN_PRODUCT, UNKNOWN_USER},
        review_service,
    },
    storage::{ImageRef, ObjectStore},
};

pub const EMPTY_CART_MESSAGE: &str = "Your cart is empty";
const LOW_STOCK_THRESHOLD: u32 = 10;

pub fn format_price(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

/// `Aug 5, 2025`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// Five glyphs: one `★` per whole point, `☆` for the rest.
pub fn stars(rating: Decimal) -> String {
    let full = rating.floor().to_usize().unwrap_or(0).min(5);
    let mut out = "★".repeat(full);
    out.push_str(&"☆".repeat(5 - full));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockLabel {
    InStock,
    LowStock(u32),
    OutOfStock,
}

impl StockLabel {
    pub fn text(&self) -> String {
        match self {
            StockLabel::InStock => "In Stock".to_string(),
            StockLabel::LowStock(n) => format!("Only {n} left"),
            StockLabel::OutOfStock => "Out of Stock".to_string(),
        }
    }
}

pub fn stock_label(stock: u32) -> StockLabel {
    match stock {
        0 => StockLabel::OutOfStock,
        n if n <= LOW_STOCK_THRESHOLD => StockLabel::LowStock(n),
        _ => StockLabel::InStock,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCard {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub price: String,
    pub stars: String,
    pub stock: String,
    pub can_add: bool,
}

pub fn product_card(product: &Product) -> ProductCard {
    ProductCard {
        id: product.id.clone(),
        name: product.name.clone(),
        brand: product.brand.clone(),
        price: format_price(product.price),
        stars: stars(product.rating),
        stock: stock_label(product.stock).text(),
        can_add: product.stock > 0,
    }
}

/// A fetchable image URL, or `None` when the product has no image yet.
pub fn product_image(product: &Product, store: &dyn ObjectStore) -> Option<String> {
    if product.image.trim().is_empty() {
        return None;
    }
    Some(ImageRef::parse(&product.image).resolve(store))
}

pub fn featured_cards(catalog: &CatalogStore) -> Vec<ProductCard> {
    catalog.featured().iter().map(product_card).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPageView {
    pub cards: Vec<ProductCard>,
    pub brands: Vec<String>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

pub fn catalog_page(catalog: &CatalogStore, query: &ProductQuery) -> CatalogPageView {
    let page = catalog.query(query);
    CatalogPageView {
        cards: page.items.iter().map(product_card).collect(),
        brands: catalog.brands().into_iter().map(str::to_string).collect(),
        page: page.page,
        total_pages: page.total_pages,
        total: page.total,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub card: ProductCard,
    pub category: String,
    pub description: String,
    pub image: Option<String>,
    /// Mean review rating to one decimal, absent without reviews.
    pub review_average: Option<String>,
    pub reviews: Vec<ReviewView>,
}

pub fn product_detail(
    product_id: &str,
    catalog: &CatalogStore,
    images: &dyn ObjectStore,
) -> Option<ProductDetail> {
    let product = catalog.product(product_id)?;
    let reviews = catalog.reviews_for(product_id);
    Some(ProductDetail {
        card: product_card(product),
        category: product.category.display_name().to_string(),
        description: product.description.clone(),
        image: product_image(product, images),
        review_average: review_service::average_rating(&reviews).map(|avg| format!("{avg:.1}")),
        reviews: review_views(product_id, catalog),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartBadge {
    pub count: u32,
    pub visible: bool,
}

pub fn cart_badge(cart: &CartLedger) -> CartBadge {
    let count = cart.badge_count();
    CartBadge {
        count,
        visible: count > 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRow {
    pub product_id: String,
    pub name: String,
    pub brand: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub rows: Vec<CartRow>,
    pub empty_message: Option<&'static str>,
    pub subtotal: String,
    pub shipping: String,
    pub total: String,
    pub checkout_enabled: bool,
}

pub fn cart_view(cart: &CartLedger, catalog: &CatalogStore) -> CartView {
    let subtotal = cart.subtotal();
    let rows = cart
        .items()
        .iter()
        .map(|item| {
            let product = catalog.product(&item.product_id);
            CartRow {
                product_id: item.product_id.clone(),
                name: product.map_or(UNKNOWN_PRODUCT, |p| p.name.as_str()).to_string(),
                brand: product.map(|p| p.brand.clone()).unwrap_or_default(),
                quantity: item.quantity,
                unit_price: format_price(item.price),
                line_total: format_price(cart_service::line_total(item)),
            }
        })
        .collect::<Vec<_>>();

    CartView {
        empty_message: rows.is_empty().then_some(EMPTY_CART_MESSAGE),
        checkout_enabled: !rows.is_empty(),
        rows,
        subtotal: format_price(subtotal),
        shipping: format_price(SHIPPING_FEE),
        total: format_price(cart_service::total_with_shipping(subtotal, SHIPPING_FEE)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub name: String,
    pub quantity: u32,
    pub line_total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: String,
    pub placed_on: String,
    pub status: String,
    pub total: String,
    pub items: Vec<OrderLineView>,
}

pub fn order_view(order: &Order, catalog: &CatalogStore) -> OrderView {
    OrderView {
        id: order.id.clone(),
        placed_on: format_date(order.date),
        status: order.status.as_str().to_uppercase(),
        total: format_price(order.total),
        items: order
            .items
            .iter()
            .map(|item| OrderLineView {
                name: catalog.product_name(&item.product_id).to_string(),
                quantity: item.quantity,
                line_total: format_price(item.price * Decimal::from(item.quantity)),
            })
            .collect(),
    }
}

pub fn user_orders(user_id: &str, catalog: &CatalogStore) -> Vec<OrderView> {
    catalog
        .orders_for(user_id)
        .into_iter()
        .map(|order| order_view(order, catalog))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderRow {
    pub id: String,
    pub customer: String,
    pub date: String,
    pub status: String,
    pub total: String,
}

pub fn admin_orders(catalog: &CatalogStore) -> Vec<AdminOrderRow> {
    catalog
        .orders()
        .iter()
        .map(|order| AdminOrderRow {
            id: order.id.clone(),
            customer: catalog.username_or(&order.user_id, UNKNOWN_USER).to_string(),
            date: format_date(order.date),
            status: order.status.as_str().to_string(),
            total: format_price(order.total),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProductRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: String,
    pub stock: u32,
    pub pending: bool,
}

pub fn admin_products(rows: &[AdminRow]) -> Vec<AdminProductRow> {
    rows.iter()
        .map(|row| AdminProductRow {
            id: row.product.id.clone(),
            name: row.product.name.clone(),
            category: row.product.category.display_name().to_string(),
            price: format_price(row.product.price),
            stock: row.product.stock,
            pending: row.pending,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsView {
    pub total_orders: usize,
    pub total_revenue: String,
    pub total_products: usize,
    pub total_customers: usize,
}

pub fn analytics_view(analytics: &Analytics) -> AnalyticsView {
    AnalyticsView {
        total_orders: analytics.total_orders,
        total_revenue: format_price(analytics.revenue),
        total_products: analytics.product_count,
        total_customers: analytics.customer_count,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    pub author: String,
    pub stars: String,
    pub date: String,
    pub comment: String,
}

pub fn review_views(product_id: &str, catalog: &CatalogStore) -> Vec<ReviewView> {
    catalog
        .reviews_for(product_id)
        .into_iter()
        .map(|review: &Review| ReviewView {
            author: catalog.username_or(&review.user_id, ANONYMOUS).to_string(),
            stars: stars(Decimal::from(review.rating)),
            date: format_date(review.date),
            comment: review.comment.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Category, OrderItem, OrderStatus},
        services::product_service::CatalogSnapshot,
        storage::LocalDiskStore,
    };

    fn milk() -> Product {
        Product {
            id: "1".into(),
            name: "Fresh Whole Milk".into(),
            category: Category::Milk,
            price: Decimal::new(399, 2),
            stock: 5,
            brand: "Dairy Farm".into(),
            description: String::new(),
            rating: Decimal::ZERO,
            image: String::new(),
        }
    }

    #[test]
    fn prices_have_two_decimals() {
        assert_eq!(format_price(Decimal::ZERO), "$0.00");
        assert_eq!(format_price(Decimal::new(1397, 2)), "$13.97");
        assert_eq!(format_price(Decimal::new(5, 0)), "$5.00");
    }

    #[test]
    fn stars_are_always_five_glyphs() {
        assert_eq!(stars(Decimal::new(45, 1)), "★★★★☆");
        assert_eq!(stars(Decimal::ZERO), "☆☆☆☆☆");
        assert_eq!(stars(Decimal::new(9, 0)), "★★★★★");
    }

    #[test]
    fn stock_labels() {
        assert_eq!(stock_label(0).text(), "Out of Stock");
        assert_eq!(stock_label(3).text(), "Only 3 left");
        assert_eq!(stock_label(50).text(), "In Stock");
    }

    #[test]
    fn empty_cart_view() {
        let view = cart_view(&CartLedger::new(), &CatalogStore::new());
        assert_eq!(view.empty_message, Some(EMPTY_CART_MESSAGE));
        assert_eq!(view.subtotal, "$0.00");
        assert!(!view.checkout_enabled);
        assert_eq!(cart_badge(&CartLedger::new()), CartBadge { count: 0, visible: false });
    }

    #[test]
    fn orders_survive_deleted_products() {
        let catalog = CatalogStore::from_snapshot(CatalogSnapshot {
            products: vec![milk()],
            ..CatalogSnapshot::default()
        });
        let order = Order {
            id: "ORD001".into(),
            user_id: "2".into(),
            status: OrderStatus::Delivered,
            total: Decimal::new(1548, 2),
            date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            items: vec![
                OrderItem {
                    product_id: "1".into(),
                    quantity: 2,
                    price: Decimal::new(399, 2),
                },
                OrderItem {
                    product_id: "5".into(),
                    quantity: 1,
                    price: Decimal::new(699, 2),
                },
            ],
        };

        let view = order_view(&order, &catalog);
        assert_eq!(view.placed_on, "Aug 5, 2025");
        assert_eq!(view.status, "DELIVERED");
        assert_eq!(view.items[0].line_total, "$7.98");
        assert_eq!(view.items[1].name, UNKNOWN_PRODUCT);
    }

    #[test]
    fn detail_includes_reviews_and_average() {
        let catalog = CatalogStore::from_snapshot(CatalogSnapshot {
            products: vec![milk()],
            reviews: vec![
                Review {
                    id: "r1".into(),
                    product_id: "1".into(),
                    user_id: "2".into(),
                    rating: 5,
                    comment: "Creamy".into(),
                    date: NaiveDate::from_ymd_opt(2025, 8, 6).unwrap(),
                },
                Review {
                    id: "r2".into(),
                    product_id: "1".into(),
                    user_id: "gone".into(),
                    rating: 4,
                    comment: "Good".into(),
                    date: NaiveDate::from_ymd_opt(2025, 8, 7).unwrap(),
                },
            ],
            ..CatalogSnapshot::default()
        });
        let store = LocalDiskStore::new("uploads", "http://localhost:3001");

        let detail = product_detail("1", &catalog, &store).unwrap();
        assert_eq!(detail.review_average.as_deref(), Some("4.5"));
        assert_eq!(detail.reviews.len(), 2);
        assert!(detail.reviews.iter().all(|r| r.author == ANONYMOUS));
        assert_eq!(detail.card.stock, "Only 5 left");
        assert!(product_detail("9", &catalog, &store).is_none());
    }

    #[test]
    fn image_paths_resolve_against_the_store() {
        let store = LocalDiskStore::new("uploads", "http://localhost:3001");
        let mut product = milk();
        assert_eq!(product_image(&product, &store), None);

        product.image = "https://cdn.example.com/milk.png".into();
        assert_eq!(
            product_image(&product, &store).as_deref(),
            Some("https://cdn.example.com/milk.png")
        );

        product.image = "local/1_milk.png".into();
        let url = product_image(&product, &store).unwrap();
        assert!(url.ends_with("1_milk.png"));
        assert!(url.starts_with("http://localhost:3001"));
    }
}
