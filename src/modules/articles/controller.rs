use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::modules::articles::model::{
    Article, ArticleFilterParams, CreateArticleDto, UpdateArticleDto,
};
use crate::modules::articles::service::ArticleService;
use crate::state::AppState;
use crate::utils::errors::AppError;

#[instrument(skip(state))]
pub async fn list_articles(
    State(state): State<AppState>,
    Query(filters): Query<ArticleFilterParams>,
) -> Json<Vec<Article>> {
    Json(ArticleService::list_articles(&state.articles, filters).await)
}

#[instrument(skip(state))]
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Article>, AppError> {
    let article = ArticleService::get_article(&state.articles, id).await?;
    Ok(Json(article))
}

#[instrument(skip(state))]
pub async fn create_article(
    State(state): State<AppState>,
    Json(dto): Json<CreateArticleDto>,
) -> Result<(StatusCode, Json<Article>), AppError> {
    dto.validate().map_err(AppError::unprocessable)?;

    let article = ArticleService::create_article(&state.articles, dto).await;

    Ok((StatusCode::CREATED, Json(article)))
}

#[instrument(skip(state))]
pub async fn update_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<UpdateArticleDto>,
) -> Result<Json<Article>, AppError> {
    dto.validate().map_err(AppError::unprocessable)?;

    let article = ArticleService::update_article(&state.articles, id, dto).await?;

    Ok(Json(article))
}

#[instrument(skip(state))]
pub async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ArticleService::delete_article(&state.articles, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
