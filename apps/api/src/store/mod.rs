//! Storage collaborators. Handlers only see these traits; `PgStore` and
//! `MemoryStore` both implement all three, and `AppState` carries each as an
//! `Arc<dyn …>`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::badges::{BadgeSet, GroupStats};
use crate::listing::{FilterSpec, ListQueryPlan, SortKey};
use crate::models::comment::{CommentChanges, CommentRow, NewComment};
use crate::models::group::{GroupChanges, GroupRow, NewGroup};
use crate::models::post::{NewPost, PostChanges, PostRow};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Sort keys each resource can be listed by.
pub const GROUP_SORT_KEYS: &[SortKey] = &[
    SortKey::Latest,
    SortKey::MostLiked,
    SortKey::MostPosted,
    SortKey::MostBadge,
];
pub const POST_SORT_KEYS: &[SortKey] = &[SortKey::Latest, SortKey::MostLiked, SortKey::MostCommented];
pub const COMMENT_SORT_KEYS: &[SortKey] = &[SortKey::Latest];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("sort key '{0}' is not supported by this listing")]
    UnsupportedSort(SortKey),
}

#[async_trait]
pub trait GroupRepo: Send + Sync {
    async fn insert(&self, group: NewGroup) -> Result<GroupRow, StoreError>;
    async fn get(&self, id: i64) -> Result<Option<GroupRow>, StoreError>;
    async fn update(&self, id: i64, changes: GroupChanges) -> Result<Option<GroupRow>, StoreError>;
    /// Removes the group together with its posts and their comments.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
    async fn find(&self, plan: &ListQueryPlan) -> Result<Vec<GroupRow>, StoreError>;
    async fn count_matching(&self, filter: &FilterSpec) -> Result<u64, StoreError>;
    /// Returns the new like count, or `None` if the group does not exist.
    async fn increment_likes(&self, id: i64) -> Result<Option<i64>, StoreError>;
    /// Replaces the stored badges.
    async fn set_badges(&self, id: i64, badges: &BadgeSet) -> Result<(), StoreError>;
    /// Adds `badges` to whatever is stored in one atomic update and returns the
    /// resulting set. Nothing already stored is removed.
    async fn merge_badges(
        &self,
        id: i64,
        badges: &BadgeSet,
    ) -> Result<Option<BadgeSet>, StoreError>;
    /// Current aggregate activity used for badge evaluation.
    async fn stats(&self, id: i64) -> Result<Option<GroupStats>, StoreError>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Also bumps the owning group's post count.
    async fn insert(&self, post: NewPost) -> Result<PostRow, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<PostRow>, StoreError>;
    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Option<PostRow>, StoreError>;
    /// Also drops the post's comments and decrements the group's post count.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn find(&self, group_id: i64, plan: &ListQueryPlan) -> Result<Vec<PostRow>, StoreError>;
    async fn count_matching(&self, group_id: i64, filter: &FilterSpec) -> Result<u64, StoreError>;
    async fn increment_likes(&self, id: Uuid) -> Result<Option<i64>, StoreError>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Also bumps the post's comment count.
    async fn insert(&self, comment: NewComment) -> Result<CommentRow, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<CommentRow>, StoreError>;
    async fn update(
        &self,
        id: Uuid,
        changes: CommentChanges,
    ) -> Result<Option<CommentRow>, StoreError>;
    /// Also decrements the post's comment count.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn find(&self, post_id: Uuid, plan: &ListQueryPlan) -> Result<Vec<CommentRow>, StoreError>;
    async fn count_matching(&self, post_id: Uuid, filter: &FilterSpec) -> Result<u64, StoreError>;
}
