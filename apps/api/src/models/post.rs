use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A memory posted to a group.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub group_id: i64,
    pub nickname: String,
    pub title: String,
    pub content: String,
    pub password_hash: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub moment: DateTime<Utc>,
    pub is_public: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewPost {
    pub group_id: i64,
    pub nickname: String,
    pub title: String,
    pub content: String,
    pub password_hash: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub moment: DateTime<Utc>,
    pub is_public: bool,
}

/// Optional fields keep the stored value when `None`.
pub struct PostChanges {
    pub nickname: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<String>,
    pub moment: Option<DateTime<Utc>>,
    pub is_public: bool,
}
