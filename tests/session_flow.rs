use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use dairyhub::{
    controller::{Page, SessionController},
    dto::catalog::ProductQuery,
    error::{AppError, AppResult},
    models::{Category, Product, Role, UserRecord},
    notice::NoticeLevel,
    services::{
        admin_service::{ProductForm, RecordState},
        auth_service::{decode_token, hash_password},
        order_service::{CheckoutStep, StepOutcome},
        upload_service::{ImageUpload, ImageUploader},
    },
    storage::{LocalDiskStore, StorageKind, StoredImage},
    store::{BackingStore, MemoryStore, memory::StoreOp},
};
use rust_decimal::Decimal;

struct ScriptedUploader {
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedUploader {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ImageUploader for ScriptedUploader {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn upload(&self, image: &ImageUpload) -> AppResult<StoredImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Upload("bucket unreachable".into()));
        }
        Ok(StoredImage {
            url: format!("https://img.dairyhub.test/{}", image.filename),
            path: format!("product-images/{}", image.filename),
            storage: StorageKind::Gcs,
        })
    }
}

fn milk(stock: u32) -> Product {
    Product {
        id: "1".into(),
        name: "Fresh Whole Milk".into(),
        category: Category::Milk,
        price: Decimal::new(399, 2),
        stock,
        brand: "Dairy Farm".into(),
        description: "Farm-fresh whole milk".into(),
        rating: Decimal::new(45, 1),
        image: "https://cdn.dairyhub.test/milk.png".into(),
    }
}

fn cheddar_form() -> ProductForm {
    ProductForm {
        name: "Aged Cheddar".into(),
        category: "cheese".into(),
        price: "8.99".into(),
        stock: "25".into(),
        brand: "Valley Creamery".into(),
        description: "Sharp and crumbly".into(),
    }
}

async fn add_user(store: &MemoryStore, email: &str, role: Role) {
    store
        .upsert_user(UserRecord {
            id: None,
            username: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            role,
            password_hash: Some(hash_password("secret123").unwrap()),
        })
        .await
        .unwrap();
}

async fn session(
    store: Arc<MemoryStore>,
    uploader: Arc<ScriptedUploader>,
    role: Option<Role>,
) -> SessionController {
    let mut controller = SessionController::new(store.clone(), uploader);
    if let Some(role) = role {
        let email = match role {
            Role::Admin => "admin@dairyhub.com",
            Role::Customer => "jane@email.com",
        };
        add_user(&store, email, role).await;
        assert!(controller.login(email, "secret123").await);
    }
    assert!(controller.refresh().await);
    controller.take_notices();
    controller
}

fn fill(controller: &mut SessionController, step: CheckoutStep) {
    for field in step.required_fields() {
        controller.set_checkout_field(field, "x");
    }
}

#[tokio::test]
async fn cart_quantity_is_capped_by_stock() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store, ScriptedUploader::ok(), None).await;

    assert!(controller.add_to_cart("1", 2));
    assert!(!controller.add_to_cart("1", 2));
    assert_eq!(controller.cart().quantity_of("1"), 2);

    let notices = controller.take_notices();
    assert_eq!(notices[0].message, "Fresh Whole Milk added to cart!");
    assert_eq!(notices[1].level, NoticeLevel::Warning);

    let badge = controller.badge();
    assert_eq!(badge.count, 2);
    assert!(badge.visible);
    assert!(controller.take_redraw().badge);

    assert!(!controller.update_cart_quantity("1", 4));
    assert!(controller.update_cart_quantity("1", 0));
    assert!(controller.cart().is_empty());
}

#[tokio::test]
async fn removing_the_last_item_hides_the_badge() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store, ScriptedUploader::ok(), None).await;

    assert!(controller.add_to_cart("1", 1));
    assert!(controller.badge().visible);
    controller.take_redraw();

    controller.remove_from_cart("1");
    assert!(controller.cart().is_empty());
    let badge = controller.badge();
    assert_eq!(badge.count, 0);
    assert!(!badge.visible);
    assert!(controller.take_redraw().badge);
}

#[tokio::test]
async fn empty_cart_shows_message_and_blocks_checkout() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store, ScriptedUploader::ok(), Some(Role::Customer)).await;

    let view = controller.cart_view();
    assert_eq!(view.empty_message, Some("Your cart is empty"));
    assert!(!view.checkout_enabled);

    controller.show_page(Page::Checkout);
    assert_eq!(controller.page(), &Page::Cart);
    assert!(controller.checkout().is_none());
}

#[tokio::test]
async fn guests_are_sent_to_login() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store, ScriptedUploader::ok(), None).await;

    controller.add_to_cart("1", 1);
    controller.show_page(Page::Checkout);
    assert_eq!(controller.page(), &Page::Login);

    controller.show_page(Page::Orders);
    assert_eq!(controller.page(), &Page::Login);
    assert!(controller.my_orders().is_empty());
}

#[tokio::test]
async fn blank_required_field_blocks_the_step() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store, ScriptedUploader::ok(), Some(Role::Customer)).await;
    controller.add_to_cart("1", 1);
    controller.show_page(Page::Checkout);

    fill(&mut controller, CheckoutStep::Shipping);
    assert_eq!(
        controller.next_step().await,
        Some(StepOutcome::Advanced(CheckoutStep::Delivery))
    );

    controller.set_checkout_field("phone", "   ");
    assert_eq!(
        controller.next_step().await,
        Some(StepOutcome::Blocked { field: "phone" })
    );
    let checkout = controller.checkout().unwrap();
    assert_eq!(checkout.step(), CheckoutStep::Delivery);
    assert_eq!(checkout.focus(), Some("phone"));
}

#[tokio::test]
async fn completed_checkout_places_the_order() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller =
        session(store.clone(), ScriptedUploader::ok(), Some(Role::Customer)).await;
    controller.add_to_cart("1", 2);
    controller.show_page(Page::Checkout);

    for step in [CheckoutStep::Shipping, CheckoutStep::Delivery] {
        fill(&mut controller, step);
        assert!(matches!(controller.next_step().await, Some(StepOutcome::Advanced(_))));
    }
    fill(&mut controller, CheckoutStep::Payment);
    assert_eq!(controller.next_step().await, Some(StepOutcome::Commit));

    let confirmation = controller.confirmation().unwrap();
    assert!(confirmation.order_id.starts_with("ORD"));
    assert!(controller.cart().is_empty());
    assert_eq!(controller.badge().count, 0);

    assert_eq!(store.fetch_products().await.unwrap()[0].stock, 1);
    assert_eq!(store.fetch_orders().await.unwrap().len(), 1);
    assert_eq!(controller.catalog().product("1").unwrap().stock, 1);
    assert_eq!(controller.my_orders().len(), 1);
    assert_eq!(controller.my_orders()[0].status, "PROCESSING");
}

#[tokio::test]
async fn failed_commit_keeps_cart_and_stock() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller =
        session(store.clone(), ScriptedUploader::ok(), Some(Role::Customer)).await;
    controller.add_to_cart("1", 2);
    controller.show_page(Page::Checkout);
    for step in [CheckoutStep::Shipping, CheckoutStep::Delivery, CheckoutStep::Payment] {
        fill(&mut controller, step);
    }
    controller.next_step().await;
    controller.next_step().await;

    store.fail_next(StoreOp::OrderWrite, 1);
    assert_eq!(controller.next_step().await, Some(StepOutcome::Commit));

    assert!(controller.confirmation().is_none());
    assert_eq!(controller.cart().quantity_of("1"), 2);
    assert_eq!(controller.checkout().unwrap().step(), CheckoutStep::Payment);
    assert_eq!(store.fetch_products().await.unwrap()[0].stock, 3);
    assert!(store.fetch_orders().await.unwrap().is_empty());

    let notices = controller.take_notices();
    assert_eq!(notices.last().unwrap().level, NoticeLevel::Error);
}

#[tokio::test]
async fn failed_product_save_is_retried_once() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let uploader = ScriptedUploader::ok();
    let mut controller = session(store.clone(), uploader.clone(), Some(Role::Admin)).await;

    store.fail_next(StoreOp::ProductWrite, 1);
    let image = ImageUpload::new("cheddar.png", "image/png", vec![1, 2, 3]);
    assert!(controller.create_product(&cheddar_form(), Some(image)).await.is_none());
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);

    let notice = controller.take_notices().pop().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    let key = notice.retry.unwrap();
    assert!(matches!(
        controller.admin().record(key).map(|r| &r.state),
        Some(RecordState::Failed(_))
    ));
    // Failed rows are not shown and no placeholder lingers.
    assert_eq!(controller.admin_rows().len(), 1);
    assert!(controller.admin_rows().iter().all(|row| !row.pending));

    let created = controller.retry_product(key).await.unwrap();
    assert_eq!(created.image, "https://img.dairyhub.test/cheddar.png");
    assert_eq!(store.fetch_products().await.unwrap().len(), 2);
    assert_eq!(controller.admin_rows().len(), 2);

    let again = controller.retry_product(key).await.unwrap();
    assert_eq!(again.id, created.id);
    assert_eq!(store.fetch_products().await.unwrap().len(), 2);
    assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upload_failure_leaves_no_record() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store.clone(), ScriptedUploader::failing(), Some(Role::Admin)).await;
    let writes = store.write_count();

    let image = ImageUpload::new("cheddar.png", "image/png", vec![1]);
    assert!(controller.create_product(&cheddar_form(), Some(image)).await.is_none());

    assert!(controller.admin().records().is_empty());
    assert_eq!(store.write_count(), writes);
    let notice = controller.take_notices().pop().unwrap();
    assert_eq!(notice.message, "Image upload failed. Please try again.");
    assert!(notice.retry.is_none());
}

#[tokio::test]
async fn editing_without_an_image_keeps_the_old_one() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store.clone(), ScriptedUploader::ok(), Some(Role::Admin)).await;

    let form = ProductForm {
        name: "Organic Whole Milk".into(),
        category: "milk".into(),
        price: "4.49".into(),
        stock: "40".into(),
        brand: "Dairy Farm".into(),
        description: String::new(),
    };
    let updated = controller.edit_product("1", &form, None).await.unwrap();
    assert_eq!(updated.name, "Organic Whole Milk");
    assert_eq!(updated.image, "https://cdn.dairyhub.test/milk.png");
    assert_eq!(controller.catalog().product("1").unwrap().stock, 40);
}

#[tokio::test]
async fn invalid_form_reports_every_field() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store.clone(), ScriptedUploader::ok(), Some(Role::Admin)).await;

    let form = ProductForm {
        price: "-1".into(),
        stock: "many".into(),
        ..ProductForm::default()
    };
    assert!(controller.create_product(&form, None).await.is_none());
    let fields: Vec<_> = controller.field_errors().iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, ["name", "brand", "category", "price", "stock"]);
    assert_eq!(store.fetch_products().await.unwrap().len(), 1);
}

#[tokio::test]
async fn customers_cannot_use_admin_actions() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store.clone(), ScriptedUploader::ok(), Some(Role::Customer)).await;

    assert!(controller.create_product(&cheddar_form(), None).await.is_none());
    assert!(!controller.delete_product("1").await);
    assert!(controller.analytics().is_none());
    assert_eq!(controller.page(), &Page::Home);

    let notice = controller.take_notices().pop().unwrap();
    assert_eq!(notice.message, "Access denied. Admin privileges required.");
    assert_eq!(store.fetch_products().await.unwrap().len(), 1);
}

#[tokio::test]
async fn refresh_is_idempotent() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store, ScriptedUploader::ok(), Some(Role::Admin)).await;

    let before = controller.catalog().products().to_vec();
    assert!(controller.refresh().await);
    assert!(controller.refresh().await);
    assert_eq!(controller.catalog().products(), before.as_slice());
}

#[tokio::test]
async fn failed_refresh_keeps_the_previous_snapshot() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut controller = session(store.clone(), ScriptedUploader::ok(), None).await;

    store.fail_next(StoreOp::Fetch, 1);
    assert!(!controller.refresh().await);
    assert_eq!(controller.catalog().products().len(), 1);
    assert_eq!(controller.take_notices().pop().unwrap().level, NoticeLevel::Error);
}

#[tokio::test]
async fn browsing_projects_the_catalog() {
    let mut gouda = milk(0);
    gouda.id = "2".into();
    gouda.name = "Smoked Gouda".into();
    gouda.category = Category::Cheese;
    gouda.brand = "Valley Creamery".into();
    let store = Arc::new(MemoryStore::with_products(vec![milk(30), gouda]));
    let controller = session(store, ScriptedUploader::ok(), None).await;

    assert_eq!(controller.featured().len(), 2);
    let page = controller.browse(&ProductQuery {
        category: Some(Category::Cheese),
        ..ProductQuery::default()
    });
    assert_eq!(page.total, 1);
    assert_eq!(page.cards[0].stock, "Out of Stock");
    assert!(!page.cards[0].can_add);
    assert_eq!(page.brands, ["Dairy Farm", "Valley Creamery"]);

    let images = LocalDiskStore::new("uploads", "http://localhost:3001");
    let detail = controller.product_detail("1", &images).unwrap();
    assert_eq!(detail.image.as_deref(), Some("https://cdn.dairyhub.test/milk.png"));
    assert_eq!(detail.review_average, None);
}

#[tokio::test]
async fn signed_in_sessions_mint_api_tokens() {
    let store = Arc::new(MemoryStore::with_products(vec![milk(3)]));
    let mut guest = session(store.clone(), ScriptedUploader::ok(), None).await;
    assert!(guest.api_token("secret").is_none());

    let mut controller = session(store, ScriptedUploader::ok(), Some(Role::Admin)).await;
    let token = controller.api_token("secret").unwrap();
    let claims = decode_token(&token, "secret").unwrap();
    assert_eq!(claims.sub, controller.session().current().unwrap().id);
    assert_eq!(claims.role, "admin");
}
