use axum::http::{HeaderValue, Method};
use axum::{Json, Router, extract::State, middleware, routing::get};
use outcache_observability::{
    PrometheusHandle, logging_middleware, metrics_middleware, metrics_router,
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::modules::articles::init_articles_router;
use crate::state::AppState;

pub fn init_router(state: AppState, metrics: Option<PrometheusHandle>) -> Router {
    let cors = {
        let allowed_origins: Vec<HeaderValue> = state
            .cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::ACCEPT,
                axum::http::header::ACCEPT_LANGUAGE,
                axum::http::header::CONTENT_TYPE,
            ])
    };

    Router::new()
        .route("/health", get(health))
        .nest("/api/articles", init_articles_router(&state.cache))
        .with_state(state)
        .merge(metrics_router(metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let store = state.cache.store();
    Json(json!({
        "status": "ok",
        "cache": {
            "target": store.target(),
            "ready": store.is_ready(),
        }
    }))
}
