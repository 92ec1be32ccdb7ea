use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::group::GroupRow;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub image_url: Option<String>,
    pub is_public: Option<bool>,
    pub introduction: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResponse {
    pub id: i64,
    pub name: String,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub introduction: String,
    pub like_count: i64,
    pub badges: Vec<String>,
    pub badge_count: usize,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<GroupRow> for GroupResponse {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            badge_count: row.badges.len(),
            name: row.name,
            image_url: row.image_url,
            is_public: row.is_public,
            introduction: row.introduction,
            like_count: row.like_count,
            badges: row.badges,
            post_count: row.post_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub like_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityResponse {
    pub id: i64,
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
