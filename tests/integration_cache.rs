mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{create_article, delete, get, json_request, send, setup_test_app, setup_test_app_with};
use outcache_config::CacheOptions;
use serde_json::json;

#[tokio::test]
async fn test_repeat_get_is_served_from_cache() {
    let app = setup_test_app();
    let id = create_article(&app.router, "Caching", "ada").await;
    let uri = format!("/api/articles/{id}");

    let (status, first) = send(&app.router, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = send(&app.router, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first, second);
    assert_eq!(first["title"], "Caching");
    assert_eq!(app.state.articles.reads(), 1);
}

#[tokio::test]
async fn test_entry_is_stored_under_derived_key() {
    let app = setup_test_app();
    let id = create_article(&app.router, "Keys", "ada").await;

    send(&app.router, get(&format!("/api/articles/{id}"))).await;
    send(&app.router, get("/api/articles?author=ada")).await;

    assert!(app.store.contains(&format!("default|get|/api/articles/{id}")).await);
    assert!(app.store.contains("default|get|/api/articles?author=ada&").await);
}

#[tokio::test]
async fn test_post_does_not_write_to_cache() {
    let app = setup_test_app();
    create_article(&app.router, "Fresh", "ada").await;

    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_not_found_is_not_cached() {
    let app = setup_test_app();
    let uri = "/api/articles/00000000-0000-0000-0000-000000000000";

    let (status, body) = send(&app.router, get(uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Article not found");

    send(&app.router, get(uri)).await;
    assert!(app.store.is_empty().await);
    assert_eq!(app.state.articles.reads(), 2);
}

#[tokio::test]
async fn test_put_evicts_article_and_listing() {
    let app = setup_test_app();
    let id = create_article(&app.router, "Draft", "ada").await;
    let uri = format!("/api/articles/{id}");

    send(&app.router, get("/api/articles")).await;
    send(&app.router, get(&uri)).await;
    assert_eq!(app.store.len().await, 2);

    let (status, body) = send(
        &app.router,
        json_request("PUT", &uri, json!({ "title": "Published" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Published");
    assert!(app.store.is_empty().await);

    let (_, listing) = send(&app.router, get("/api/articles")).await;
    assert_eq!(listing[0]["title"], "Published");
    let (_, article) = send(&app.router, get(&uri)).await;
    assert_eq!(article["title"], "Published");
    assert_eq!(app.state.articles.reads(), 4);
}

#[tokio::test]
async fn test_put_evicts_filtered_listing() {
    let app = setup_test_app();
    let id = create_article(&app.router, "Draft", "ada").await;

    let (_, listing) = send(&app.router, get("/api/articles?author=ada")).await;
    assert_eq!(listing[0]["title"], "Draft");
    assert!(app.store.contains("default|get|/api/articles?author=ada&").await);

    let (status, _) = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/articles/{id}"),
            json!({ "title": "Published" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.store.contains("default|get|/api/articles?author=ada&").await);

    let (_, listing) = send(&app.router, get("/api/articles?author=ada")).await;
    assert_eq!(listing[0]["title"], "Published");
    assert_eq!(app.state.articles.reads(), 2);
}

#[tokio::test]
async fn test_delete_evicts_article() {
    let app = setup_test_app();
    let id = create_article(&app.router, "Short lived", "ada").await;
    let uri = format!("/api/articles/{id}");

    let (status, _) = send(&app.router, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, delete(&uri)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app.router, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unavailable_store_passes_through() {
    let app = setup_test_app();
    let id = create_article(&app.router, "Offline", "ada").await;
    let uri = format!("/api/articles/{id}");
    app.store.set_ready(false);

    for _ in 0..2 {
        let (status, body) = send(&app.router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Offline");
    }
    assert_eq!(app.state.articles.reads(), 2);

    let (status, _) = send(&app.router, json_request("PUT", &uri, json!({ "body": "x" }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_vary_headers_split_entries() {
    let options = CacheOptions::default().with_vary_by_headers(["accept-language"]);
    let app = setup_test_app_with(options);
    let id = create_article(&app.router, "Bonjour", "ada").await;
    let uri = format!("/api/articles/{id}");

    let with_language = |language: &str| {
        Request::builder()
            .uri(uri.as_str())
            .header("Accept-Language", language)
            .body(Body::empty())
            .unwrap()
    };

    send(&app.router, with_language("en")).await;
    send(&app.router, with_language("fr")).await;
    send(&app.router, with_language("en")).await;

    assert_eq!(app.state.articles.reads(), 2);
    assert!(
        app.store
            .contains(&format!("default|get|/api/articles/{id}|accept-language=fr"))
            .await
    );
}

#[tokio::test]
async fn test_health_reports_cache_store() {
    let app = setup_test_app();

    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache"]["target"], "memory");
    assert_eq!(body["cache"]["ready"], true);
}
