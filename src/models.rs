use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// The six fixed catalog categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Milk,
    Cheese,
    Butter,
    Yogurt,
    IceCream,
    Cream,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Milk,
        Category::Cheese,
        Category::Butter,
        Category::Yogurt,
        Category::IceCream,
        Category::Cream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Milk => "milk",
            Category::Cheese => "cheese",
            Category::Butter => "butter",
            Category::Yogurt => "yogurt",
            Category::IceCream => "ice-cream",
            Category::Cream => "cream",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Milk => "Milk",
            Category::Cheese => "Cheese",
            Category::Butter => "Butter",
            Category::Yogurt => "Yogurt",
            Category::IceCream => "Ice Cream",
            Category::Cream => "Cream",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::Milk => "Fresh and organic milk varieties",
            Category::Cheese => "Artisanal and aged cheese selection",
            Category::Butter => "Creamy butter for all your needs",
            Category::Yogurt => "Healthy and delicious yogurt",
            Category::IceCream => "Premium ice cream flavors",
            Category::Cream => "Rich cream for cooking and baking",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Cheese => "🧀",
            Category::Butter => "🧈",
            Category::IceCream => "🍦",
            Category::Milk | Category::Yogurt | Category::Cream => "🥛",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| AppError::BadRequest(format!("unknown category: {s}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: Category,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub stock: u32,
    pub brand: String,
    pub description: String,
    #[schema(value_type = String)]
    pub rating: Decimal,
    pub image: String,
}

/// Product payload before the store has allocated an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub category: Category,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub stock: u32,
    pub brand: String,
    pub description: String,
    #[schema(value_type = String)]
    pub rating: Decimal,
    pub image: String,
}

impl NewProduct {
    pub fn into_product(self, id: String) -> Product {
        Product {
            id,
            name: self.name,
            category: self.category,
            price: self.price,
            stock: self.stock,
            brand: self.brand,
            description: self.description,
            rating: self.rating,
            image: self.image,
        }
    }
}

/// Partial update; `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<Category>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl ProductPatch {
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(brand) = self.brand {
            product.brand = brand;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(image) = self.image {
            product.image = image;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
    #[schema(value_type = String)]
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(AppError::BadRequest("Invalid order status".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
    #[schema(value_type = String)]
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub date: NaiveDate,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub product_id: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" | "user" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::BadRequest(format!("unknown role: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A user record as written to the store, with its credential hash.
///
/// Profiles created through the upload server's `/api/users` endpoint have no
/// local password.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Option<String>,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: Option<String>,
}
