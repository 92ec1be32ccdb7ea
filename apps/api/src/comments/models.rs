use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::comment::CommentRow;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub nickname: Option<String>,
    pub content: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub nickname: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentRow> for CommentResponse {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            nickname: row.nickname,
            content: row.content,
            created_at: row.created_at,
        }
    }
}
