use outcache_cache::OutputCache;
use std::sync::Arc;

use crate::config::cors::CorsConfig;
use crate::modules::articles::ArticleStore;

#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: OutputCache,
    pub articles: Arc<ArticleStore>,
    pub cors_config: CorsConfig,
}

impl AppState {
    pub fn new(cache: OutputCache, cors_config: CorsConfig) -> Self {
        Self {
            cache,
            articles: Arc::new(ArticleStore::new()),
            cors_config,
        }
    }
}
