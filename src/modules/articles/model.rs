use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateArticleDto {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub body: String,
    #[validate(length(min = 1, max = 100))]
    pub author: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateArticleDto {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleFilterParams {
    /// Exact, case-insensitive author match.
    pub author: Option<String>,
}
