use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::post::PostRow;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub nickname: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub post_password: Option<String>,
    pub group_password: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<String>,
    pub moment: Option<DateTime<Utc>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub nickname: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub post_password: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<String>,
    pub moment: Option<DateTime<Utc>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPasswordBody {
    pub post_password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub group_id: i64,
    pub nickname: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub moment: DateTime<Utc>,
    pub is_public: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<PostRow> for PostResponse {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            group_id: row.group_id,
            nickname: row.nickname,
            title: row.title,
            content: row.content,
            image_url: row.image_url,
            tags: row.tags,
            location: row.location,
            moment: row.moment,
            is_public: row.is_public,
            like_count: row.like_count,
            comment_count: row.comment_count,
            created_at: row.created_at,
        }
    }
}
