//! Cart Ledger: the session's product → (quantity, price snapshot) mapping.
//!
//! Quantities never exceed the product's stock as seen by the catalog at the
//! time of the mutation, and the unit price is captured once, when the product
//! is first added.

use rust_decimal::Decimal;

use crate::{
    models::{CartItem, Product},
    notice::Notice,
    services::product_service::CatalogStore,
};

/// Flat shipping fee shown on the cart page ($5.99).
pub const SHIPPING_FEE: Decimal = Decimal::from_parts(599, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartRejection {
    UnknownProduct,
    InvalidQuantity,
    OutOfStock { name: String },
    StockLimitReached { available: u32 },
    ExceedsStock { available: u32 },
}

impl CartRejection {
    pub fn notice(&self) -> Notice {
        match self {
            CartRejection::UnknownProduct => Notice::warning("This product is no longer available."),
            CartRejection::InvalidQuantity => Notice::warning("Quantity must be at least 1."),
            CartRejection::OutOfStock { name } => Notice::warning(format!("{name} is out of stock.")),
            CartRejection::StockLimitReached { .. } => {
                Notice::warning("Cannot add more items. Stock limit reached.")
            }
            CartRejection::ExceedsStock { .. } => Notice::warning("Cannot exceed stock limit."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    Added { quantity: u32 },
    Updated { quantity: u32 },
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartLedger {
    items: Vec<CartItem>,
}

impl CartLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn quantity_of(&self, product_id: &str) -> u32 {
        self.item(product_id).map_or(0, |item| item.quantity)
    }

    fn item(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    pub fn add(
        &mut self,
        catalog: &CatalogStore,
        product_id: &str,
        quantity: u32,
    ) -> Result<CartChange, CartRejection> {
        let product = catalog
            .product(product_id)
            .ok_or(CartRejection::UnknownProduct)?;
        if product.stock == 0 {
            return Err(CartRejection::OutOfStock {
                name: product.name.clone(),
            });
        }
        if quantity == 0 {
            return Err(CartRejection::InvalidQuantity);
        }

        match self.items.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => {
                let new_quantity = item.quantity.saturating_add(quantity);
                if new_quantity > product.stock {
                    return Err(CartRejection::StockLimitReached {
                        available: product.stock,
                    });
                }
                item.quantity = new_quantity;
                Ok(CartChange::Updated {
                    quantity: new_quantity,
                })
            }
            None => {
                let quantity = quantity.min(product.stock);
                self.items.push(snapshot(product, quantity));
                Ok(CartChange::Added { quantity })
            }
        }
    }

    pub fn remove(&mut self, product_id: &str) -> CartChange {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        if self.items.len() == before {
            CartChange::Unchanged
        } else {
            CartChange::Removed
        }
    }

    /// Replaces the quantity in place; zero or less removes the line.
    pub fn update_quantity(
        &mut self,
        catalog: &CatalogStore,
        product_id: &str,
        quantity: i64,
    ) -> Result<CartChange, CartRejection> {
        if quantity <= 0 {
            return Ok(self.remove(product_id));
        }
        let product = catalog
            .product(product_id)
            .ok_or(CartRejection::UnknownProduct)?;
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if quantity > product.stock {
            return Err(CartRejection::ExceedsStock {
                available: product.stock,
            });
        }

        match self.items.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                Ok(CartChange::Updated { quantity })
            }
            None => Ok(CartChange::Unchanged),
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn subtotal(&self) -> Decimal {
        subtotal(&self.items)
    }

    pub fn badge_count(&self) -> u32 {
        badge_count(&self.items)
    }
}

fn snapshot(product: &Product, quantity: u32) -> CartItem {
    CartItem {
        product_id: product.id.clone(),
        quantity,
        price: product.price,
    }
}

pub fn line_total(item: &CartItem) -> Decimal {
    item.price * Decimal::from(item.quantity)
}

pub fn subtotal(items: &[CartItem]) -> Decimal {
    items.iter().map(line_total).sum()
}

pub fn total_with_shipping(subtotal: Decimal, shipping: Decimal) -> Decimal {
    subtotal + shipping
}

pub fn badge_count(items: &[CartItem]) -> u32 {
    items.iter().map(|item| item.quantity).sum()
}
