use anyhow::anyhow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::modules::articles::model::{
    Article, ArticleFilterParams, CreateArticleDto, UpdateArticleDto,
};
use crate::utils::errors::AppError;

/// In-memory article repository.
///
/// Counts every read that reaches it, which is how the cache's effect on
/// the handlers can be observed.
#[derive(Debug, Default)]
pub struct ArticleStore {
    articles: RwLock<BTreeMap<Uuid, Article>>,
    reads: AtomicUsize,
}

impl ArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of list or lookup calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct ArticleService;

impl ArticleService {
    #[instrument(skip(store))]
    pub async fn list_articles(store: &ArticleStore, filters: ArticleFilterParams) -> Vec<Article> {
        store.record_read();
        store
            .articles
            .read()
            .await
            .values()
            .filter(|article| {
                filters
                    .author
                    .as_deref()
                    .is_none_or(|author| article.author.eq_ignore_ascii_case(author))
            })
            .cloned()
            .collect()
    }

    #[instrument(skip(store))]
    pub async fn get_article(store: &ArticleStore, id: Uuid) -> Result<Article, AppError> {
        store.record_read();
        store
            .articles
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(anyhow!("Article not found")))
    }

    #[instrument(skip(store))]
    pub async fn create_article(store: &ArticleStore, dto: CreateArticleDto) -> Article {
        let article = Article {
            id: Uuid::new_v4(),
            title: dto.title,
            body: dto.body,
            author: dto.author,
        };
        store
            .articles
            .write()
            .await
            .insert(article.id, article.clone());
        debug!(article.id = %article.id, "Article created");
        article
    }

    #[instrument(skip(store))]
    pub async fn update_article(
        store: &ArticleStore,
        id: Uuid,
        dto: UpdateArticleDto,
    ) -> Result<Article, AppError> {
        let mut articles = store.articles.write().await;
        let article = articles
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(anyhow!("Article not found")))?;

        if let Some(title) = dto.title {
            article.title = title;
        }
        if let Some(body) = dto.body {
            article.body = body;
        }

        Ok(article.clone())
    }

    #[instrument(skip(store))]
    pub async fn delete_article(store: &ArticleStore, id: Uuid) -> Result<(), AppError> {
        store
            .articles
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(anyhow!("Article not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn dto(title: &str, author: &str) -> CreateArticleDto {
        CreateArticleDto {
            title: title.into(),
            body: "body".into(),
            author: author.into(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = ArticleStore::new();
        let created = ArticleService::create_article(&store, dto("Hello", "ada")).await;

        let fetched = ArticleService::get_article(&store, created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_author() {
        let store = ArticleStore::new();
        ArticleService::create_article(&store, dto("One", "ada")).await;
        ArticleService::create_article(&store, dto("Two", "grace")).await;

        let filters = ArticleFilterParams {
            author: Some("ADA".into()),
        };
        let articles = ArticleService::list_articles(&store, filters).await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "One");

        let all = ArticleService::list_articles(&store, ArticleFilterParams::default()).await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_missing_fields() {
        let store = ArticleStore::new();
        let created = ArticleService::create_article(&store, dto("Hello", "ada")).await;

        let update = UpdateArticleDto {
            title: Some("Renamed".into()),
            body: None,
        };
        let updated = ArticleService::update_article(&store, created.id, update)
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.body, "body");
    }

    #[tokio::test]
    async fn test_missing_article_is_not_found() {
        let store = ArticleStore::new();
        let id = Uuid::new_v4();

        let err = ArticleService::get_article(&store, id).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = ArticleService::delete_article(&store, id).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
