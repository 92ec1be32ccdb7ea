use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub nickname: String,
    pub content: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewComment {
    pub post_id: Uuid,
    pub nickname: String,
    pub content: String,
    pub password_hash: String,
}

pub struct CommentChanges {
    pub nickname: String,
    pub content: String,
}
