use axum::{Router, middleware, routing::get};
use outcache_cache::{OutputCache, RouteCacheOptions, output_cache};

use crate::state::AppState;

use super::controller::{
    create_article, delete_article, get_article, list_articles, update_article,
};

/// Article routes. Reads are cached; updates and deletes evict the article
/// and the collection listing.
pub fn init_articles_router(cache: &OutputCache) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_articles)
                .route_layer(middleware::from_fn_with_state(
                    cache.route(RouteCacheOptions::cacheable()),
                    output_cache,
                ))
                .post(create_article),
        )
        .route(
            "/{id}",
            get(get_article)
                .put(update_article)
                .delete(delete_article)
                .route_layer(middleware::from_fn_with_state(
                    cache.route(RouteCacheOptions::cacheable().with_clear_cache()),
                    output_cache,
                )),
        )
}
