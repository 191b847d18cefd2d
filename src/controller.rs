//! The single owner of a shopper's session.
//!
//! Every user action goes through `&mut self`, so actions are applied one at
//! a time. Failures never escape: they become a [`Notice`] and leave the
//! session as it was.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    dto::{
        auth::{LoginRequest, RegisterRequest},
        catalog::ProductQuery,
    },
    error::{AppError, FieldError},
    models::{OrderStatus, Product, Review},
    notice::Notice,
    services::{
        admin_service::{self, AdminPanel, AdminRow, Analytics, CreateOutcome, ProductForm},
        auth_service::{self, Session},
        cart_service::{CartChange, CartLedger},
        order_service::{self, CheckoutSequencer, Confirmation, ShippingOption, StepOutcome},
        product_service::CatalogStore,
        review_service::{self, ReviewForm},
        upload_service::{ImageUpload, ImageUploader},
    },
    storage::ObjectStore,
    store::BackingStore,
    views::{self, CartBadge, CartView, CatalogPageView, OrderView, ProductCard, ProductDetail},
};

const ACCESS_DENIED: &str = "Access denied. Admin privileges required.";
const ORDER_FAILED: &str = "Unable to place your order. Please try again.";
const SAVE_FAILED: &str = "Unable to save product. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Home,
    Products,
    Product(String),
    Cart,
    Checkout,
    Orders,
    Profile,
    Admin,
    Login,
}

/// Parts of the screen that need drawing again after an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Redraw {
    pub badge: bool,
    pub cart_view: bool,
    pub page: bool,
}

pub struct SessionController {
    store: Arc<dyn BackingStore>,
    uploader: Arc<dyn ImageUploader>,
    catalog: CatalogStore,
    session: Session,
    cart: CartLedger,
    checkout: Option<CheckoutSequencer>,
    confirmation: Option<Confirmation>,
    admin: AdminPanel,
    field_errors: Vec<FieldError>,
    notices: Vec<Notice>,
    page: Page,
    redraw: Redraw,
}

impl SessionController {
    pub fn new(store: Arc<dyn BackingStore>, uploader: Arc<dyn ImageUploader>) -> Self {
        Self {
            store,
            uploader,
            catalog: CatalogStore::new(),
            session: Session::default(),
            cart: CartLedger::new(),
            checkout: None,
            confirmation: None,
            admin: AdminPanel::new(),
            field_errors: Vec::new(),
            notices: Vec::new(),
            page: Page::Home,
            redraw: Redraw::default(),
        }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cart(&self) -> &CartLedger {
        &self.cart
    }

    pub fn checkout(&self) -> Option<&CheckoutSequencer> {
        self.checkout.as_ref()
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    pub fn admin(&self) -> &AdminPanel {
        &self.admin
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Offending fields of the last rejected form.
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn take_redraw(&mut self) -> Redraw {
        std::mem::take(&mut self.redraw)
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Refetches the whole catalog. On failure the previous snapshot stays.
    pub async fn refresh(&mut self) -> bool {
        match self.catalog.refresh(self.store.as_ref()).await {
            Ok(()) => {
                self.admin.reconcile(&self.catalog);
                self.redraw.page = true;
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "catalog refresh failed");
                self.notify(Notice::error("Unable to load products. Please try again."));
                false
            }
        }
    }

    /// Maps a failure to the notice the user sees.
    fn report(&mut self, err: AppError, generic: &str) {
        match err {
            AppError::Validation(fields) => {
                self.field_errors = fields;
                self.notify(Notice::warning("Please fill in all required fields."));
            }
            AppError::Auth(message) => self.notify(Notice::error(message)),
            AppError::Forbidden => self.deny(),
            AppError::Unauthorized => self.notify(Notice::warning("Please login to continue.")),
            AppError::NotFound => self.notify(Notice::warning("That item no longer exists.")),
            AppError::BadRequest(message) => self.notify(Notice::warning(message)),
            other if other.is_transient() => {
                tracing::warn!(error = %other, "action failed, service unavailable");
                self.notify(Notice::error(generic));
            }
            other => {
                tracing::error!(error = %other, "action failed");
                self.notify(Notice::error(generic));
            }
        }
    }

    fn deny(&mut self) {
        self.notify(Notice::error(ACCESS_DENIED));
        self.go(Page::Home);
    }

    fn go(&mut self, page: Page) {
        self.page = page;
        self.redraw.page = true;
    }

    fn require_admin(&mut self) -> bool {
        if auth_service::ensure_admin(&self.session).is_ok() {
            true
        } else {
            self.deny();
            false
        }
    }

    pub fn show_page(&mut self, page: Page) {
        match page {
            Page::Admin if !self.session.is_admin() => self.deny(),
            Page::Orders | Page::Profile if !self.session.is_signed_in() => {
                let what = if page == Page::Orders { "orders" } else { "profile" };
                self.notify(Notice::warning(format!("Please login to view {what}.")));
                self.go(Page::Login);
            }
            Page::Checkout => self.begin_checkout(),
            page => self.go(page),
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> bool {
        self.field_errors.clear();
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        match auth_service::login(self.store.as_ref(), request).await {
            Ok(user) => {
                self.notify(Notice::success(format!("Welcome back, {}!", user.username)));
                self.session.sign_in(user);
                self.redraw.page = true;
                true
            }
            Err(err) => {
                self.report(err, "Unable to sign in. Please try again.");
                false
            }
        }
    }

    pub async fn register(&mut self, request: RegisterRequest) -> bool {
        self.field_errors.clear();
        match auth_service::register(self.store.as_ref(), request).await {
            Ok(user) => {
                self.notify(Notice::success(format!("Welcome to DairyHub, {}!", user.username)));
                self.session.sign_in(user);
                self.refresh().await;
                true
            }
            Err(err) => {
                self.report(err, "Unable to register. Please try again.");
                false
            }
        }
    }

    /// Bearer token for the upload server's authenticated endpoints.
    pub fn api_token(&mut self, secret: &str) -> Option<String> {
        let user = self.session.current()?;
        match auth_service::issue_token(user, secret) {
            Ok(token) => Some(token),
            Err(err) => {
                self.report(err, "Unable to sign in. Please try again.");
                None
            }
        }
    }

    pub fn logout(&mut self) {
        self.session.sign_out();
        self.cart.clear();
        self.checkout = None;
        self.confirmation = None;
        self.redraw.badge = true;
        self.go(Page::Home);
        self.notify(Notice::success("You have been logged out successfully."));
    }

    fn cart_changed(&mut self) {
        self.redraw.badge = true;
        if self.page == Page::Cart {
            self.redraw.cart_view = true;
        }
    }

    pub fn add_to_cart(&mut self, product_id: &str, quantity: u32) -> bool {
        match self.cart.add(&self.catalog, product_id, quantity) {
            Ok(_) => {
                let name = self.catalog.product_name(product_id).to_string();
                self.notify(Notice::success(format!("{name} added to cart!")));
                self.cart_changed();
                true
            }
            Err(rejection) => {
                self.notify(rejection.notice());
                false
            }
        }
    }

    pub fn remove_from_cart(&mut self, product_id: &str) {
        if self.cart.remove(product_id) == CartChange::Removed {
            self.cart_changed();
        }
    }

    pub fn update_cart_quantity(&mut self, product_id: &str, quantity: i64) -> bool {
        match self.cart.update_quantity(&self.catalog, product_id, quantity) {
            Ok(CartChange::Unchanged) => true,
            Ok(_) => {
                self.cart_changed();
                true
            }
            Err(rejection) => {
                self.notify(rejection.notice());
                false
            }
        }
    }

    fn begin_checkout(&mut self) {
        match order_service::begin_checkout(self.session.current(), &self.cart) {
            Ok(checkout) => {
                self.checkout = Some(checkout);
                self.confirmation = None;
                self.go(Page::Checkout);
            }
            Err(redirect) => {
                self.notify(redirect.notice());
                self.go(match redirect {
                    order_service::CheckoutRedirect::Login => Page::Login,
                    order_service::CheckoutRedirect::Cart => Page::Cart,
                });
            }
        }
    }

    pub fn set_checkout_field(&mut self, name: &str, value: &str) {
        if let Some(checkout) = self.checkout.as_mut() {
            checkout.set_field(name, value);
        }
    }

    pub fn select_shipping(&mut self, option: ShippingOption) {
        if let Some(checkout) = self.checkout.as_mut() {
            checkout.select_shipping(option);
        }
    }

    pub async fn next_step(&mut self) -> Option<StepOutcome> {
        let outcome = self.checkout.as_mut()?.next_step();
        match &outcome {
            StepOutcome::Blocked { .. } => {
                self.notify(Notice::warning("Please fill in all required fields."));
            }
            StepOutcome::Commit => self.commit_order().await,
            StepOutcome::Advanced(_) | StepOutcome::AlreadyComplete => {}
        }
        Some(outcome)
    }

    pub fn prev_step(&mut self) {
        if let Some(checkout) = self.checkout.as_mut() {
            checkout.prev_step();
        }
    }

    async fn commit_order(&mut self) {
        let (Some(user), Some(shipping)) = (
            self.session.current().cloned(),
            self.checkout.as_ref().map(CheckoutSequencer::shipping),
        ) else {
            return;
        };

        let placed = order_service::process_order(
            self.store.as_ref(),
            &mut self.cart,
            &user,
            shipping,
            Self::today(),
        )
        .await;
        match placed {
            Ok(confirmation) => {
                self.confirmation = Some(confirmation);
                self.cart_changed();
                self.notify(Notice::success("Order placed successfully!"));
                self.refresh().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "checkout commit rejected");
                if let Some(checkout) = self.checkout.as_mut() {
                    checkout.prev_step();
                }
                self.notify(Notice::error(ORDER_FAILED));
            }
        }
    }

    pub async fn submit_review(&mut self, form: ReviewForm) -> Option<Review> {
        self.field_errors.clear();
        let Some(user) = self.session.current().cloned() else {
            self.notify(Notice::warning("Please login to write a review."));
            return None;
        };
        let result = review_service::submit_review(
            self.store.as_ref(),
            &self.catalog,
            &user,
            form,
            Self::today(),
        )
        .await;
        match result {
            Ok(review) => {
                self.notify(Notice::success("Thank you for your review!"));
                self.refresh().await;
                Some(review)
            }
            Err(err) => {
                self.report(err, "Unable to submit your review. Please try again.");
                None
            }
        }
    }

    pub async fn create_product(
        &mut self,
        form: &ProductForm,
        image: Option<ImageUpload>,
    ) -> Option<Product> {
        if !self.require_admin() {
            return None;
        }
        self.field_errors.clear();
        let outcome = self
            .admin
            .create_product(self.store.as_ref(), self.uploader.as_ref(), form, image)
            .await;
        self.finish_create(outcome).await
    }

    pub async fn retry_product(&mut self, key: Uuid) -> Option<Product> {
        if !self.require_admin() {
            return None;
        }
        let outcome = self.admin.retry(self.store.as_ref(), key).await;
        self.finish_create(outcome).await
    }

    pub fn discard_retry(&mut self, key: Uuid) {
        if self.admin.discard(key) {
            self.redraw.page = true;
        }
    }

    async fn finish_create(&mut self, outcome: Result<CreateOutcome, AppError>) -> Option<Product> {
        match outcome {
            Ok(CreateOutcome::Created(product)) => {
                self.notify(Notice::success("Product added successfully"));
                self.refresh().await;
                Some(product)
            }
            Ok(CreateOutcome::Failed { retry, error }) => {
                tracing::warn!(error = %error, key = %retry.key, "product save offered for retry");
                self.redraw.page = true;
                self.notify(Notice::error(SAVE_FAILED).with_retry(retry.key));
                None
            }
            Err(err @ AppError::Upload(_)) => {
                tracing::warn!(error = %err, "image upload failed on every path");
                self.notify(Notice::error("Image upload failed. Please try again."));
                None
            }
            Err(err) => {
                self.report(err, SAVE_FAILED);
                None
            }
        }
    }

    pub async fn edit_product(
        &mut self,
        id: &str,
        form: &ProductForm,
        image: Option<ImageUpload>,
    ) -> Option<Product> {
        if !self.require_admin() {
            return None;
        }
        self.field_errors.clear();
        let result = admin_service::edit_product(
            self.store.as_ref(),
            self.uploader.as_ref(),
            id,
            form,
            image,
        )
        .await;
        match result {
            Ok(product) => {
                self.notify(Notice::success("Product updated successfully"));
                self.refresh().await;
                Some(product)
            }
            Err(err) => {
                self.report(err, SAVE_FAILED);
                None
            }
        }
    }

    pub async fn delete_product(&mut self, id: &str) -> bool {
        if !self.require_admin() {
            return false;
        }
        match admin_service::delete_product(self.store.as_ref(), id).await {
            Ok(()) => {
                self.notify(Notice::success("Product deleted successfully"));
                self.refresh().await;
                true
            }
            Err(err) => {
                self.report(err, "Unable to delete product. Please try again.");
                false
            }
        }
    }

    pub async fn update_order_status(&mut self, id: &str, status: OrderStatus) -> bool {
        if !self.require_admin() {
            return false;
        }
        match admin_service::update_order_status(self.store.as_ref(), id, status).await {
            Ok(order) => {
                self.notify(Notice::success(format!(
                    "Order {} status updated to {}",
                    order.id, order.status
                )));
                self.refresh().await;
                true
            }
            Err(err) => {
                self.report(err, "Unable to update order. Please try again.");
                false
            }
        }
    }

    pub fn analytics(&mut self) -> Option<Analytics> {
        if !self.require_admin() {
            return None;
        }
        Some(admin_service::analytics(&self.catalog))
    }

    pub fn admin_rows(&self) -> Vec<AdminRow> {
        self.admin.display_rows(&self.catalog)
    }

    pub fn badge(&self) -> CartBadge {
        views::cart_badge(&self.cart)
    }

    pub fn cart_view(&self) -> CartView {
        views::cart_view(&self.cart, &self.catalog)
    }

    /// Orders placed by the signed-in user.
    pub fn my_orders(&self) -> Vec<OrderView> {
        self.session
            .current()
            .map(|user| views::user_orders(&user.id, &self.catalog))
            .unwrap_or_default()
    }

    pub fn featured(&self) -> Vec<ProductCard> {
        views::featured_cards(&self.catalog)
    }

    pub fn browse(&self, query: &ProductQuery) -> CatalogPageView {
        views::catalog_page(&self.catalog, query)
    }

    pub fn product_detail(&self, id: &str, images: &dyn ObjectStore) -> Option<ProductDetail> {
        views::product_detail(id, &self.catalog, images)
    }
}
