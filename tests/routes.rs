use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use dairyhub::{
    config::AppConfig,
    models::{Role, User},
    routes::create_router,
    services::{
        auth_service::issue_token,
        upload_service::{ImageUpload, ImageUploader, session_uploader},
    },
    state::AppState,
    storage::{RemoteObjectStore, StorageKind},
    store::{BackingStore, MemoryStore},
};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "dairyhub-boundary";

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    uploads: tempfile::TempDir,
}

fn harness() -> Harness {
    let uploads = tempfile::tempdir().unwrap();
    let config = AppConfig {
        database_url: String::new(),
        host: "127.0.0.1".into(),
        port: 3001,
        upload_dir: uploads.path().to_path_buf(),
        public_base_url: "http://localhost:3001".into(),
        object_store_url: None,
        object_store_token: None,
        jwt_secret: Some(SECRET.into()),
    };
    let store = Arc::new(MemoryStore::new());
    let app = create_router(AppState::new(store.clone(), config));
    Harness {
        app,
        store,
        uploads: uploads,
    }
}

fn multipart(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn at(mut request: Request<Body>, uri: &str) -> Request<Body> {
    *request.uri_mut() = uri.parse().unwrap();
    request
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn user_token(id: &str, role: Role) -> String {
    let user = User {
        id: id.into(),
        username: "jane".into(),
        email: "jane@email.com".into(),
        role,
    };
    issue_token(&user, SECRET).unwrap()
}

fn profile_request(token: Option<&str>, body: Value) -> Request<Body> {
    let mut request = Request::post("/api/users").header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    request.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness();
    let response = h
        .app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn root_serves_the_banner() {
    let h = harness();
    let response = h
        .app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], dairyhub::routes::health::BANNER.as_bytes());
}

#[tokio::test]
async fn upload_without_a_file_is_rejected() {
    let h = harness();
    let request = at(multipart(None, &[("name", "Milk")]), "/upload");
    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({ "error": "No file uploaded" }));
}

#[tokio::test]
async fn non_multipart_upload_is_rejected() {
    let h = harness();
    let request = Request::post("/upload").body(Body::from("plain")).unwrap();
    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No file uploaded");
}

#[tokio::test]
async fn upload_falls_back_to_local_disk() {
    let h = harness();
    let request = at(multipart(Some(("milk.png", &[1, 2, 3])), &[]), "/upload");
    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["storage"], "local");
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("http://localhost:3001/static/"));
    assert!(url.ends_with("milk.png"));
    assert_eq!(std::fs::read_dir(h.uploads.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn create_product_stores_image_and_document() {
    let h = harness();
    let request = at(
        multipart(
            Some(("gouda.png", &[9, 9])),
            &[("name", "Smoked Gouda"), ("category", "cheese"), ("price", "-3"), ("stock", "12")],
        ),
        "/create-product",
    );
    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let id = body["id"].as_str().unwrap();
    let products = h.store.fetch_products().await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, id);
    assert_eq!(products[0].name, "Smoked Gouda");
    assert_eq!(products[0].stock, 12);
    assert!(products[0].price.is_zero());
    assert!(products[0].image.ends_with("gouda.png"));
}

#[tokio::test]
async fn create_product_with_unknown_category_writes_nothing() {
    let h = harness();
    let request = at(
        multipart(Some(("x.png", &[1])), &[("name", "Kefir"), ("category", "drinks")]),
        "/create-product",
    );
    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.store.fetch_products().await.unwrap().is_empty());
    assert_eq!(std::fs::read_dir(h.uploads.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn purge_with_fresh_files_removes_nothing() {
    let h = harness();
    std::fs::write(h.uploads.path().join("1_milk.png"), [1]).unwrap();
    let response = h
        .app
        .oneshot(
            Request::delete("/purge-old-uploads?days=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["removedCount"], 0);
    assert!(h.uploads.path().join("1_milk.png").exists());
}

#[tokio::test]
async fn profile_requires_a_token() {
    let h = harness();
    let response = h
        .app
        .oneshot(profile_request(None, json!({ "uid": "u1", "email": "jane@email.com" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid token");
}

#[tokio::test]
async fn profile_rejects_garbage_tokens() {
    let h = harness();
    let response = h
        .app
        .oneshot(profile_request(
            Some("not-a-jwt"),
            json!({ "uid": "u1", "email": "jane@email.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_upsert_for_own_uid() {
    let h = harness();
    let token = user_token("u1", Role::Customer);
    let response = h
        .app
        .oneshot(profile_request(
            Some(&token),
            json!({ "uid": "u1", "email": "jane@email.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["user"]["id"], "u1");
    assert_eq!(body["user"]["username"], "jane@email.com");
    assert_eq!(body["user"]["role"], "customer");
    assert_eq!(h.store.fetch_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn profile_for_another_uid_is_forbidden() {
    let h = harness();
    let token = user_token("u1", Role::Customer);
    let response = h
        .app
        .oneshot(profile_request(
            Some(&token),
            json!({ "uid": "u2", "email": "bob@email.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(h.store.fetch_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn profile_without_email_is_a_bad_request() {
    let h = harness();
    let token = user_token("u1", Role::Customer);
    let response = h
        .app
        .oneshot(profile_request(Some(&token), json!({ "uid": "u1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Missing uid or email");
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let h = harness();
    let response = h
        .app
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_uploads_fall_back_to_the_upload_server() {
    let h = harness();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = h.app.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Nothing listens on port 9 of loopback, so the bucket is unreachable.
    let bucket = Arc::new(RemoteObjectStore::new("http://127.0.0.1:9".to_string(), None));
    let uploader = session_uploader(bucket, &format!("http://{addr}"));

    let stored = uploader
        .upload(&ImageUpload::new("butter.png", "image/png", vec![4, 5, 6]))
        .await
        .unwrap();
    assert_eq!(stored.storage, StorageKind::Local);
    assert!(stored.path.starts_with("local/"));
    assert!(stored.url.ends_with("butter.png"));
    assert_eq!(std::fs::read_dir(h.uploads.path()).unwrap().count(), 1);
}
