use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::badges::streak::current_streak_days;
use crate::badges::{BadgeSet, GroupStats};
use crate::listing::{FilterSpec, ListQueryPlan, SortDirection, SortField, SortKey};
use crate::models::comment::{CommentChanges, CommentRow, NewComment};
use crate::models::group::{GroupChanges, GroupRow, NewGroup};
use crate::models::post::{NewPost, PostChanges, PostRow};
use crate::store::{
    CommentRepo, GroupRepo, PostRepo, StoreError, COMMENT_SORT_KEYS, GROUP_SORT_KEYS,
    POST_SORT_KEYS,
};

#[derive(Default)]
struct Tables {
    next_group_id: i64,
    groups: Vec<GroupRow>,
    posts: Vec<PostRow>,
    comments: Vec<CommentRow>,
}

/// Process-local store. Rows are kept in insertion order, which is the
/// tie-break order for equal sort values.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Applies the plan's sort, skip and limit to already-filtered rows.
fn apply_plan<T>(
    mut rows: Vec<T>,
    plan: &ListQueryPlan,
    supported: &[SortKey],
    compare: impl Fn(SortField, &T, &T) -> Ordering,
) -> Result<Vec<T>, StoreError> {
    if !supported.contains(&plan.sort.key) {
        return Err(StoreError::UnsupportedSort(plan.sort.key));
    }
    let field = plan.sort.field;
    // `sort_by` is stable, so equal values keep insertion order.
    rows.sort_by(|a, b| match plan.sort.direction {
        SortDirection::Asc => compare(field, a, b),
        SortDirection::Desc => compare(field, b, a),
    });
    Ok(rows
        .into_iter()
        .skip(plan.skip as usize)
        .take(plan.limit as usize)
        .collect())
}

fn compare_groups(field: SortField, a: &GroupRow, b: &GroupRow) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::LikeCount => a.like_count.cmp(&b.like_count),
        SortField::PostCount => a.post_count.cmp(&b.post_count),
        SortField::BadgeCount => a.badges.len().cmp(&b.badges.len()),
        SortField::CommentCount => Ordering::Equal,
    }
}

fn compare_posts(field: SortField, a: &PostRow, b: &PostRow) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::LikeCount => a.like_count.cmp(&b.like_count),
        SortField::CommentCount => a.comment_count.cmp(&b.comment_count),
        SortField::PostCount | SortField::BadgeCount => Ordering::Equal,
    }
}

fn compare_comments(field: SortField, a: &CommentRow, b: &CommentRow) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        _ => Ordering::Equal,
    }
}

fn group_matches(filter: &FilterSpec, group: &GroupRow) -> bool {
    filter.matches_text(&group.name) && filter.matches_visibility(group.is_public)
}

fn post_matches(group_id: i64, filter: &FilterSpec, post: &PostRow) -> bool {
    post.group_id == group_id
        && filter.matches_text(&post.title)
        && filter.matches_visibility(post.is_public)
}

fn comment_matches(post_id: Uuid, filter: &FilterSpec, comment: &CommentRow) -> bool {
    comment.post_id == post_id && filter.matches_text(&comment.content)
}

#[async_trait]
impl GroupRepo for MemoryStore {
    async fn insert(&self, group: NewGroup) -> Result<GroupRow, StoreError> {
        let mut tables = self.tables.write().await;
        tables.next_group_id += 1;
        let row = GroupRow {
            id: tables.next_group_id,
            name: group.name,
            password_hash: group.password_hash,
            image_url: group.image_url,
            is_public: group.is_public,
            introduction: group.introduction,
            like_count: 0,
            badges: Vec::new(),
            post_count: 0,
            created_at: Utc::now(),
        };
        tables.groups.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: i64) -> Result<Option<GroupRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn update(&self, id: i64, changes: GroupChanges) -> Result<Option<GroupRow>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(group) = tables.groups.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        group.name = changes.name;
        if changes.image_url.is_some() {
            group.image_url = changes.image_url;
        }
        group.is_public = changes.is_public;
        if let Some(introduction) = changes.introduction {
            group.introduction = introduction;
        }
        Ok(Some(group.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.groups.len();
        tables.groups.retain(|g| g.id != id);
        if tables.groups.len() == before {
            return Ok(false);
        }
        let post_ids: Vec<Uuid> = tables
            .posts
            .iter()
            .filter(|p| p.group_id == id)
            .map(|p| p.id)
            .collect();
        tables.posts.retain(|p| p.group_id != id);
        tables.comments.retain(|c| !post_ids.contains(&c.post_id));
        Ok(true)
    }

    async fn find(&self, plan: &ListQueryPlan) -> Result<Vec<GroupRow>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .groups
            .iter()
            .filter(|g| group_matches(&plan.filter, g))
            .cloned()
            .collect();
        apply_plan(rows, plan, GROUP_SORT_KEYS, compare_groups)
    }

    async fn count_matching(&self, filter: &FilterSpec) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.groups.iter().filter(|g| group_matches(filter, g)).count() as u64)
    }

    async fn increment_likes(&self, id: i64) -> Result<Option<i64>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.groups.iter_mut().find(|g| g.id == id).map(|g| {
            g.like_count += 1;
            g.like_count
        }))
    }

    async fn set_badges(&self, id: i64, badges: &BadgeSet) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(group) = tables.groups.iter_mut().find(|g| g.id == id) {
            group.badges = badges.iter().map(|b| b.as_str().to_string()).collect();
        }
        Ok(())
    }

    async fn merge_badges(
        &self,
        id: i64,
        badges: &BadgeSet,
    ) -> Result<Option<BadgeSet>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(group) = tables.groups.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        let mut merged = group.badge_set();
        merged.extend(badges.iter().copied());
        group.badges = merged.iter().map(|b| b.as_str().to_string()).collect();
        Ok(Some(merged))
    }

    async fn stats(&self, id: i64) -> Result<Option<GroupStats>, StoreError> {
        let tables = self.tables.read().await;
        let Some(group) = tables.groups.iter().find(|g| g.id == id) else {
            return Ok(None);
        };
        let posts: Vec<&PostRow> = tables.posts.iter().filter(|p| p.group_id == id).collect();
        let days: Vec<_> = posts.iter().map(|p| p.created_at.date_naive()).collect();
        Ok(Some(GroupStats {
            memory_count: posts.len() as u64,
            memory_streak_days: current_streak_days(&days),
            space_received_bytes: posts.iter().map(|p| p.content.len() as u64).sum(),
            like_count: group.like_count.max(0) as u64,
        }))
    }
}

#[async_trait]
impl PostRepo for MemoryStore {
    async fn insert(&self, post: NewPost) -> Result<PostRow, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = PostRow {
            id: Uuid::new_v4(),
            group_id: post.group_id,
            nickname: post.nickname,
            title: post.title,
            content: post.content,
            password_hash: post.password_hash,
            image_url: post.image_url,
            tags: post.tags,
            location: post.location,
            moment: post.moment,
            is_public: post.is_public,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };
        if let Some(group) = tables.groups.iter_mut().find(|g| g.id == row.group_id) {
            group.post_count += 1;
        }
        tables.posts.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PostRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Option<PostRow>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(post) = tables.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        post.nickname = changes.nickname;
        post.title = changes.title;
        post.content = changes.content;
        if changes.image_url.is_some() {
            post.image_url = changes.image_url;
        }
        if let Some(tags) = changes.tags {
            post.tags = tags;
        }
        if changes.location.is_some() {
            post.location = changes.location;
        }
        if let Some(moment) = changes.moment {
            post.moment = moment;
        }
        post.is_public = changes.is_public;
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.posts.iter().position(|p| p.id == id) else {
            return Ok(false);
        };
        let post = tables.posts.remove(index);
        tables.comments.retain(|c| c.post_id != id);
        if let Some(group) = tables.groups.iter_mut().find(|g| g.id == post.group_id) {
            group.post_count = (group.post_count - 1).max(0);
        }
        Ok(true)
    }

    async fn find(&self, group_id: i64, plan: &ListQueryPlan) -> Result<Vec<PostRow>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .posts
            .iter()
            .filter(|p| post_matches(group_id, &plan.filter, p))
            .cloned()
            .collect();
        apply_plan(rows, plan, POST_SORT_KEYS, compare_posts)
    }

    async fn count_matching(&self, group_id: i64, filter: &FilterSpec) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .filter(|p| post_matches(group_id, filter, p))
            .count() as u64)
    }

    async fn increment_likes(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.posts.iter_mut().find(|p| p.id == id).map(|p| {
            p.like_count += 1;
            p.like_count
        }))
    }
}

#[async_trait]
impl CommentRepo for MemoryStore {
    async fn insert(&self, comment: NewComment) -> Result<CommentRow, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = CommentRow {
            id: Uuid::new_v4(),
            post_id: comment.post_id,
            nickname: comment.nickname,
            content: comment.content,
            password_hash: comment.password_hash,
            created_at: now,
            updated_at: now,
        };
        if let Some(post) = tables.posts.iter_mut().find(|p| p.id == row.post_id) {
            post.comment_count += 1;
        }
        tables.comments.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CommentRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: CommentChanges,
    ) -> Result<Option<CommentRow>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.iter_mut().find(|c| c.id == id).map(|c| {
            c.nickname = changes.nickname;
            c.content = changes.content;
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.comments.iter().position(|c| c.id == id) else {
            return Ok(false);
        };
        let comment = tables.comments.remove(index);
        if let Some(post) = tables.posts.iter_mut().find(|p| p.id == comment.post_id) {
            post.comment_count = (post.comment_count - 1).max(0);
        }
        Ok(true)
    }

    async fn find(&self, post_id: Uuid, plan: &ListQueryPlan) -> Result<Vec<CommentRow>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .comments
            .iter()
            .filter(|c| comment_matches(post_id, &plan.filter, c))
            .cloned()
            .collect();
        apply_plan(rows, plan, COMMENT_SORT_KEYS, compare_comments)
    }

    async fn count_matching(&self, post_id: Uuid, filter: &FilterSpec) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .iter()
            .filter(|c| comment_matches(post_id, filter, c))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{plan_list_query, ListQueryRequest};

    fn plan(page: u64, page_size: u64, sort_by: &str) -> ListQueryPlan {
        plan_list_query(&ListQueryRequest {
            page: Some(page.to_string()),
            page_size: Some(page_size.to_string()),
            sort_by: Some(sort_by.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    fn new_group(name: &str, is_public: bool) -> NewGroup {
        NewGroup {
            name: name.to_string(),
            password_hash: "hash".to_string(),
            image_url: None,
            is_public,
            introduction: String::new(),
        }
    }

    fn new_post(group_id: i64, title: &str, content: &str, is_public: bool) -> NewPost {
        NewPost {
            group_id,
            nickname: "nick".to_string(),
            title: title.to_string(),
            content: content.to_string(),
            password_hash: "hash".to_string(),
            image_url: None,
            tags: vec![],
            location: None,
            moment: Utc::now(),
            is_public,
        }
    }

    #[tokio::test]
    async fn test_third_page_of_twenty_five() {
        let store = MemoryStore::new();
        let group = GroupRepo::insert(&store, new_group("g", true)).await.unwrap();
        for i in 0..25 {
            PostRepo::insert(&store, new_post(group.id, &format!("post {i}"), "x", true))
                .await
                .unwrap();
        }

        let third = plan(3, 10, "latest");
        let total = PostRepo::count_matching(&store, group.id, &third.filter)
            .await
            .unwrap();
        let rows = PostRepo::find(&store, group.id, &third).await.unwrap();
        let envelope = third.envelope(total);
        assert_eq!(envelope.total_pages, 3);
        assert_eq!(envelope.current_page, 3);
        assert_eq!(envelope.total_item_count, 25);
        assert_eq!(rows.len(), 5);

        let past_end = plan(4, 10, "latest");
        assert!(PostRepo::find(&store, group.id, &past_end)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_group_sort_and_tie_order() {
        let store = MemoryStore::new();
        let a = GroupRepo::insert(&store, new_group("a", true)).await.unwrap();
        let b = GroupRepo::insert(&store, new_group("b", true)).await.unwrap();
        let c = GroupRepo::insert(&store, new_group("c", true)).await.unwrap();
        GroupRepo::increment_likes(&store, b.id).await.unwrap();
        GroupRepo::increment_likes(&store, b.id).await.unwrap();
        GroupRepo::increment_likes(&store, c.id).await.unwrap();

        let rows = GroupRepo::find(&store, &plan(1, 10, "mostLiked")).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);

        // nobody has posts yet, so insertion order decides
        let rows = GroupRepo::find(&store, &plan(1, 10, "mostPosted")).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_filters_keyword_and_visibility() {
        let store = MemoryStore::new();
        GroupRepo::insert(&store, new_group("Summer Trip", true)).await.unwrap();
        GroupRepo::insert(&store, new_group("winter trip", false)).await.unwrap();
        GroupRepo::insert(&store, new_group("Family", false)).await.unwrap();

        let trips = FilterSpec {
            keyword: Some("TRIP".to_string()),
            is_public: None,
        };
        assert_eq!(GroupRepo::count_matching(&store, &trips).await.unwrap(), 2);

        let private = FilterSpec {
            keyword: None,
            is_public: Some(false),
        };
        assert_eq!(GroupRepo::count_matching(&store, &private).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_sort_is_rejected() {
        let store = MemoryStore::new();
        let group = GroupRepo::insert(&store, new_group("g", true)).await.unwrap();
        PostRepo::insert(&store, new_post(group.id, "t", "c", true))
            .await
            .unwrap();
        let err = PostRepo::find(&store, group.id, &plan(1, 10, "mostBadge"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedSort(_)));
    }

    #[tokio::test]
    async fn test_counters_follow_inserts_and_deletes() {
        let store = MemoryStore::new();
        let group = GroupRepo::insert(&store, new_group("g", true)).await.unwrap();
        let post = PostRepo::insert(&store, new_post(group.id, "t", "c", true))
            .await
            .unwrap();
        let comment = CommentRepo::insert(
            &store,
            NewComment {
                post_id: post.id,
                nickname: "n".to_string(),
                content: "nice".to_string(),
                password_hash: "hash".to_string(),
            },
        )
        .await
        .unwrap();

        let stored = PostRepo::get(&store, post.id).await.unwrap().unwrap();
        assert_eq!(stored.comment_count, 1);
        assert!(CommentRepo::delete(&store, comment.id).await.unwrap());
        let stored = PostRepo::get(&store, post.id).await.unwrap().unwrap();
        assert_eq!(stored.comment_count, 0);

        assert_eq!(GroupRepo::get(&store, group.id).await.unwrap().unwrap().post_count, 1);
        assert!(PostRepo::delete(&store, post.id).await.unwrap());
        assert_eq!(GroupRepo::get(&store, group.id).await.unwrap().unwrap().post_count, 0);
        assert!(!PostRepo::delete(&store, post.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_aggregate_posts() {
        let store = MemoryStore::new();
        let group = GroupRepo::insert(&store, new_group("g", true)).await.unwrap();
        PostRepo::insert(&store, new_post(group.id, "a", "12345", true))
            .await
            .unwrap();
        PostRepo::insert(&store, new_post(group.id, "b", "678", false))
            .await
            .unwrap();
        GroupRepo::increment_likes(&store, group.id).await.unwrap();

        let stats = GroupRepo::stats(&store, group.id).await.unwrap().unwrap();
        assert_eq!(stats.memory_count, 2);
        assert_eq!(stats.space_received_bytes, 8);
        assert_eq!(stats.memory_streak_days, 1);
        assert_eq!(stats.like_count, 1);
        assert!(GroupRepo::stats(&store, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_group_cascades() {
        let store = MemoryStore::new();
        let group = GroupRepo::insert(&store, new_group("g", true)).await.unwrap();
        let post = PostRepo::insert(&store, new_post(group.id, "t", "c", true))
            .await
            .unwrap();
        assert!(GroupRepo::delete(&store, group.id).await.unwrap());
        assert!(PostRepo::get(&store, post.id).await.unwrap().is_none());
        assert!(!GroupRepo::delete(&store, group.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_merge_badges_only_adds() {
        use crate::badges::BadgeId;

        let store = MemoryStore::new();
        let group = GroupRepo::insert(&store, new_group("g", true)).await.unwrap();
        GroupRepo::set_badges(&store, group.id, &BadgeSet::from([BadgeId::MemoryCount20]))
            .await
            .unwrap();

        let merged = GroupRepo::merge_badges(&store, group.id, &BadgeSet::from([BadgeId::LikeCount10000]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            merged,
            BadgeSet::from([BadgeId::MemoryCount20, BadgeId::LikeCount10000])
        );
        let stored = GroupRepo::get(&store, group.id).await.unwrap().unwrap();
        assert_eq!(stored.badges, vec!["memory-count-20", "like-count-10000"]);

        assert!(GroupRepo::merge_badges(&store, 999, &merged)
            .await
            .unwrap()
            .is_none());
    }
}
