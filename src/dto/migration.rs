//! Document shapes of the JSON export read by the `migrate` and `seed` binaries.
//!
//! Identifiers may be JSON numbers or strings; both become opaque strings.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;

use crate::{
    error::AppResult,
    models::{Category, Order, OrderItem, OrderStatus, Product, Review, Role},
    store::new_document_id,
};

/// The four collections, kept as raw documents so one bad record does not
/// spoil the whole file.
#[derive(Debug, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub products: Vec<Value>,
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(default)]
    pub orders: Vec<Value>,
    #[serde(default)]
    pub reviews: Vec<Value>,
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(id_from_value))
}

fn required_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    id_from_value(Value::deserialize(deserializer)?)
        .ok_or_else(|| D::Error::custom("expected a string or numeric identifier"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDoc {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: Decimal,
    #[serde(default)]
    pub image: String,
}

impl ProductDoc {
    pub fn into_product(self) -> AppResult<Product> {
        Ok(Product {
            id: self.id.unwrap_or_else(new_document_id),
            category: Category::from_str(&self.category)?,
            name: self.name,
            price: self.price,
            stock: self.stock,
            brand: self.brand,
            description: self.description,
            rating: self.rating,
            image: self.image,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Plaintext from the demo export; hashed before it is stored.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
}

impl UserDoc {
    pub fn role(&self) -> AppResult<Role> {
        self.role.as_deref().map_or(Ok(Role::Customer), Role::from_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDoc {
    #[serde(deserialize_with = "required_id")]
    pub product_id: String,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDoc {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    #[serde(deserialize_with = "required_id")]
    pub user_id: String,
    pub status: String,
    pub total: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub items: Vec<OrderItemDoc>,
}

impl OrderDoc {
    pub fn into_order(self) -> AppResult<Order> {
        Ok(Order {
            id: self.id.unwrap_or_else(new_document_id),
            user_id: self.user_id,
            status: OrderStatus::from_str(&self.status)?,
            total: self.total,
            date: self.date,
            items: self
                .items
                .into_iter()
                .map(|item| OrderItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDoc {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
    #[serde(deserialize_with = "required_id")]
    pub product_id: String,
    #[serde(deserialize_with = "required_id")]
    pub user_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub date: NaiveDate,
}

impl ReviewDoc {
    pub fn into_review(self) -> Review {
        Review {
            id: self.id.unwrap_or_else(new_document_id),
            product_id: self.product_id,
            user_id: self.user_id,
            rating: self.rating,
            comment: self.comment,
            date: self.date,
        }
    }
}
