use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use outcache::config::cors::CorsConfig;
use outcache::router::init_router;
use outcache::state::AppState;
use outcache_cache::{MemoryStore, OutputCache};
use outcache_config::CacheOptions;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(CacheOptions::default())
}

pub fn setup_test_app_with(options: CacheOptions) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        OutputCache::new(store.clone(), options),
        CorsConfig::default(),
    );
    TestApp {
        router: init_router(state.clone(), None),
        state,
        store,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Create an article and return its id.
pub async fn create_article(app: &Router, title: &str, author: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/articles",
            json!({ "title": title, "body": "Lorem ipsum", "author": author }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}
