//! Checkout Sequencer: the four-step order wizard and its commit.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Order, OrderItem, OrderStatus, User},
    notice::Notice,
    services::cart_service::{self, CartLedger},
    store::BackingStore,
};

const DELIVERY_DAYS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckoutStep {
    Shipping = 1,
    Delivery = 2,
    Payment = 3,
    Confirmation = 4,
}

impl CheckoutStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    fn next(self) -> Option<Self> {
        match self {
            CheckoutStep::Shipping => Some(CheckoutStep::Delivery),
            CheckoutStep::Delivery => Some(CheckoutStep::Payment),
            CheckoutStep::Payment => Some(CheckoutStep::Confirmation),
            CheckoutStep::Confirmation => None,
        }
    }

    fn prev(self) -> Self {
        match self {
            CheckoutStep::Shipping | CheckoutStep::Delivery => CheckoutStep::Shipping,
            CheckoutStep::Payment => CheckoutStep::Delivery,
            CheckoutStep::Confirmation => CheckoutStep::Payment,
        }
    }

    /// Fields that must be non-blank before leaving this step, in form order.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            CheckoutStep::Shipping => &[
                "first_name",
                "last_name",
                "address",
                "city",
                "state",
                "zip_code",
            ],
            CheckoutStep::Delivery => &["shipping_method", "phone"],
            CheckoutStep::Payment => &["card_name", "card_number", "expiry", "cvv"],
            CheckoutStep::Confirmation => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShippingOption {
    #[default]
    Standard,
    Express,
    Overnight,
}

impl ShippingOption {
    pub const ALL: [ShippingOption; 3] = [
        ShippingOption::Standard,
        ShippingOption::Express,
        ShippingOption::Overnight,
    ];

    pub fn cost(self) -> Decimal {
        match self {
            ShippingOption::Standard => cart_service::SHIPPING_FEE,
            ShippingOption::Express => Decimal::new(1299, 2),
            ShippingOption::Overnight => Decimal::new(1999, 2),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShippingOption::Standard => "standard",
            ShippingOption::Express => "express",
            ShippingOption::Overnight => "overnight",
        }
    }
}

impl fmt::Display for ShippingOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShippingOption {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShippingOption::ALL
            .into_iter()
            .find(|option| option.as_str() == s.trim())
            .ok_or_else(|| AppError::BadRequest(format!("unknown shipping option: {s}")))
    }
}

/// Why checkout could not be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutRedirect {
    Login,
    Cart,
}

impl CheckoutRedirect {
    pub fn notice(self) -> Notice {
        match self {
            CheckoutRedirect::Login => Notice::warning("Please login to checkout."),
            CheckoutRedirect::Cart => Notice::warning("Your cart is empty."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced(CheckoutStep),
    /// A required field was blank; it now holds focus.
    Blocked { field: &'static str },
    /// The wizard moved into the confirmation step and the order must be committed.
    Commit,
    AlreadyComplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSequencer {
    step: CheckoutStep,
    fields: BTreeMap<&'static str, String>,
    focus: Option<&'static str>,
}

impl Default for CheckoutSequencer {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("shipping_method", ShippingOption::Standard.as_str().to_string());
        Self {
            step: CheckoutStep::Shipping,
            fields,
            focus: None,
        }
    }
}

/// Entry guard: a signed-in user with a non-empty cart starts at step 1.
pub fn begin_checkout(
    user: Option<&User>,
    cart: &CartLedger,
) -> Result<CheckoutSequencer, CheckoutRedirect> {
    if user.is_none() {
        return Err(CheckoutRedirect::Login);
    }
    if cart.is_empty() {
        return Err(CheckoutRedirect::Cart);
    }
    Ok(CheckoutSequencer::default())
}

impl CheckoutSequencer {
    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn focus(&self) -> Option<&'static str> {
        self.focus
    }

    /// Records a form value. Names outside the wizard's forms are ignored.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let known = [
            CheckoutStep::Shipping,
            CheckoutStep::Delivery,
            CheckoutStep::Payment,
        ]
        .into_iter()
        .flat_map(|step| step.required_fields().iter().copied())
        .find(|field| *field == name);
        if let Some(field) = known {
            self.fields.insert(field, value.into());
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Selected shipping option; anything unrecognised counts as standard.
    pub fn shipping(&self) -> ShippingOption {
        self.field("shipping_method")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn select_shipping(&mut self, option: ShippingOption) {
        self.fields
            .insert("shipping_method", option.as_str().to_string());
    }

    fn first_blank(&self) -> Option<&'static str> {
        self.step
            .required_fields()
            .iter()
            .copied()
            .find(|field| self.field(field).is_none_or(|v| v.trim().is_empty()))
    }

    pub fn next_step(&mut self) -> StepOutcome {
        let Some(next) = self.step.next() else {
            return StepOutcome::AlreadyComplete;
        };
        if let Some(field) = self.first_blank() {
            self.focus = Some(field);
            return StepOutcome::Blocked { field };
        }
        self.focus = None;
        self.step = next;
        if next == CheckoutStep::Confirmation {
            StepOutcome::Commit
        } else {
            StepOutcome::Advanced(next)
        }
    }

    pub fn prev_step(&mut self) -> CheckoutStep {
        self.focus = None;
        self.step = self.step.prev();
        self.step
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSummary {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

pub fn summarize(cart: &CartLedger, shipping: ShippingOption) -> CheckoutSummary {
    let subtotal = cart.subtotal();
    CheckoutSummary {
        subtotal,
        shipping: shipping.cost(),
        total: cart_service::total_with_shipping(subtotal, shipping.cost()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub order_id: String,
    pub estimated_delivery: NaiveDate,
    pub order: Order,
}

/// `ORD` followed by eight uppercase hex digits.
pub fn new_order_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("ORD{}", hex[..8].to_uppercase())
}

pub fn build_order(user: &User, cart: &CartLedger, shipping: ShippingOption, date: NaiveDate) -> Order {
    Order {
        id: new_order_id(),
        user_id: user.id.clone(),
        status: OrderStatus::Processing,
        total: summarize(cart, shipping).total,
        date,
        items: cart
            .items()
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                price: item.price,
            })
            .collect(),
    }
}

/// Commits the cart as an order. The cart is cleared only once the store has
/// accepted the order and its stock decrements.
pub async fn process_order(
    store: &dyn BackingStore,
    cart: &mut CartLedger,
    user: &User,
    shipping: ShippingOption,
    today: NaiveDate,
) -> AppResult<Confirmation> {
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let order = build_order(user, cart, shipping, today);
    let order = match store.place_order(order).await {
        Ok(order) => order,
        Err(err) => {
            tracing::error!(error = %err, user_id = %user.id, "order commit failed");
            return Err(err);
        }
    };
    cart.clear();

    let estimated_delivery = order
        .date
        .checked_add_days(Days::new(DELIVERY_DAYS))
        .unwrap_or(order.date);
    tracing::info!(order_id = %order.id, total = %order.total, "order placed");

    Ok(Confirmation {
        order_id: order.id.clone(),
        estimated_delivery,
        order,
    })
}
