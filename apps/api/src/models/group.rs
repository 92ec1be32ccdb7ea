use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::badges::{BadgeId, BadgeSet};

#[derive(Debug, Clone, FromRow)]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub introduction: String,
    pub like_count: i64,
    pub badges: Vec<String>,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
}

impl GroupRow {
    /// Stored badges as typed ids. Tokens no longer in the rule table are dropped.
    pub fn badge_set(&self) -> BadgeSet {
        self.badges
            .iter()
            .filter_map(|b| BadgeId::from_str(b).ok())
            .collect()
    }
}

pub struct NewGroup {
    pub name: String,
    pub password_hash: String,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub introduction: String,
}

/// `None` keeps the stored value.
pub struct GroupChanges {
    pub name: String,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub introduction: Option<String>,
}
