use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::Category;

pub const PRODUCTS_PER_PAGE: usize = 12;

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl Pagination {
    pub fn page(page: usize) -> Self {
        Self {
            page: Some(page),
            per_page: None,
        }
    }

    /// Returns `(page, per_page, offset)` with the page clamped to at least 1.
    pub fn normalize(&self) -> (usize, usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(PRODUCTS_PER_PAGE).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ProductSort {
    #[default]
    Name,
    PriceLow,
    PriceHigh,
    Rating,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub category: Option<Category>,
    pub brand: Option<String>,
    #[schema(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    /// Case-insensitive match against name, description and brand.
    pub q: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    #[serde(flatten)]
    pub pagination: Pagination,
}
