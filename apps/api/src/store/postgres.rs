use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::badges::streak::current_streak_days;
use crate::badges::{BadgeId, BadgeSet, GroupStats};
use crate::listing::{FilterSpec, ListQueryPlan, SortField};
use crate::models::comment::{CommentChanges, CommentRow, NewComment};
use crate::models::group::{GroupChanges, GroupRow, NewGroup};
use crate::models::post::{NewPost, PostChanges, PostRow};
use crate::store::{CommentRepo, GroupRepo, PostRepo, StoreError};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Columns and predicates a listing query is built from.
struct Listing {
    table: &'static str,
    /// Column matched by the keyword filter.
    text_column: &'static str,
    visibility_column: Option<&'static str>,
    /// Parent key restricting the listing, e.g. posts of one group.
    scope_column: Option<&'static str>,
    sort_column: fn(SortField) -> Option<&'static str>,
}

const GROUPS: Listing = Listing {
    table: "groups",
    text_column: "name",
    visibility_column: Some("is_public"),
    scope_column: None,
    sort_column: group_sort_column,
};

const POSTS: Listing = Listing {
    table: "posts",
    text_column: "title",
    visibility_column: Some("is_public"),
    scope_column: Some("group_id"),
    sort_column: post_sort_column,
};

const COMMENTS: Listing = Listing {
    table: "comments",
    text_column: "content",
    visibility_column: None,
    scope_column: Some("post_id"),
    sort_column: comment_sort_column,
};

fn group_sort_column(field: SortField) -> Option<&'static str> {
    match field {
        SortField::CreatedAt => Some("created_at"),
        SortField::LikeCount => Some("like_count"),
        SortField::PostCount => Some("post_count"),
        SortField::BadgeCount => Some("cardinality(badges)"),
        SortField::CommentCount => None,
    }
}

fn post_sort_column(field: SortField) -> Option<&'static str> {
    match field {
        SortField::CreatedAt => Some("created_at"),
        SortField::LikeCount => Some("like_count"),
        SortField::CommentCount => Some("comment_count"),
        SortField::PostCount | SortField::BadgeCount => None,
    }
}

fn comment_sort_column(field: SortField) -> Option<&'static str> {
    match field {
        SortField::CreatedAt => Some("created_at"),
        _ => None,
    }
}

/// Escapes LIKE metacharacters so the keyword matches literally.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Scope value bound into the WHERE clause.
enum Scope {
    None,
    Group(i64),
    Post(Uuid),
}

impl Listing {
    fn push_where<'a>(
        &self,
        qb: &mut QueryBuilder<'a, Postgres>,
        scope: &Scope,
        filter: &'a FilterSpec,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(column) = self.scope_column {
            match scope {
                Scope::Group(id) => {
                    qb.push(format!(" AND {column} = ")).push_bind(*id);
                }
                Scope::Post(id) => {
                    qb.push(format!(" AND {column} = ")).push_bind(*id);
                }
                Scope::None => {}
            }
        }
        if let Some(keyword) = &filter.keyword {
            qb.push(format!(" AND {} ILIKE ", self.text_column))
                .push_bind(like_pattern(keyword));
        }
        if let (Some(column), Some(is_public)) = (self.visibility_column, filter.is_public) {
            qb.push(format!(" AND {column} = ")).push_bind(is_public);
        }
    }

    fn select<'a>(
        &self,
        scope: Scope,
        plan: &'a ListQueryPlan,
    ) -> Result<QueryBuilder<'a, Postgres>, StoreError> {
        let sort_column = (self.sort_column)(plan.sort.field)
            .ok_or(StoreError::UnsupportedSort(plan.sort.key))?;
        let mut qb = QueryBuilder::new(format!("SELECT * FROM {}", self.table));
        self.push_where(&mut qb, &scope, &plan.filter);
        // `id` only fixes the order of ties so pages never overlap.
        qb.push(format!(
            " ORDER BY {sort_column} {}, id",
            plan.sort.direction.sql()
        ));
        // The planner keeps skip and limit within BIGINT range.
        qb.push(" LIMIT ").push_bind(plan.limit as i64);
        qb.push(" OFFSET ").push_bind(plan.skip as i64);
        debug!(
            table = self.table,
            sort = %plan.sort.key,
            skip = plan.skip,
            limit = plan.limit,
            "Planned list query"
        );
        Ok(qb)
    }

    fn count<'a>(&self, scope: Scope, filter: &'a FilterSpec) -> QueryBuilder<'a, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", self.table));
        self.push_where(&mut qb, &scope, filter);
        qb
    }
}

#[async_trait]
impl GroupRepo for PgStore {
    async fn insert(&self, group: NewGroup) -> Result<GroupRow, StoreError> {
        Ok(sqlx::query_as::<_, GroupRow>(
            r#"
            INSERT INTO groups (name, password_hash, image_url, is_public, introduction)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(group.name)
        .bind(group.password_hash)
        .bind(group.image_url)
        .bind(group.is_public)
        .bind(group.introduction)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get(&self, id: i64) -> Result<Option<GroupRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, GroupRow>("SELECT * FROM groups WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update(&self, id: i64, changes: GroupChanges) -> Result<Option<GroupRow>, StoreError> {
        Ok(sqlx::query_as::<_, GroupRow>(
            r#"
            UPDATE groups
            SET name = $2,
                image_url = COALESCE($3, image_url),
                is_public = $4,
                introduction = COALESCE($5, introduction)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.image_url)
        .bind(changes.is_public)
        .bind(changes.introduction)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        // posts and comments go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, plan: &ListQueryPlan) -> Result<Vec<GroupRow>, StoreError> {
        let mut qb = GROUPS.select(Scope::None, plan)?;
        Ok(qb.build_query_as::<GroupRow>().fetch_all(&self.pool).await?)
    }

    async fn count_matching(&self, filter: &FilterSpec) -> Result<u64, StoreError> {
        let mut qb = GROUPS.count(Scope::None, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn increment_likes(&self, id: i64) -> Result<Option<i64>, StoreError> {
        Ok(sqlx::query_scalar(
            "UPDATE groups SET like_count = like_count + 1 WHERE id = $1 RETURNING like_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_badges(&self, id: i64, badges: &BadgeSet) -> Result<(), StoreError> {
        let tokens: Vec<String> = badges.iter().map(|b| b.as_str().to_string()).collect();
        sqlx::query("UPDATE groups SET badges = $2 WHERE id = $1")
            .bind(id)
            .bind(tokens)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn merge_badges(
        &self,
        id: i64,
        badges: &BadgeSet,
    ) -> Result<Option<BadgeSet>, StoreError> {
        let tokens: Vec<String> = badges.iter().map(|b| b.as_str().to_string()).collect();
        // The row lock makes concurrent merges see each other's writes.
        let stored: Option<Vec<String>> = sqlx::query_scalar(
            r#"
            UPDATE groups
            SET badges = ARRAY(
                SELECT DISTINCT b FROM unnest(badges || $2::TEXT[]) AS b ORDER BY b
            )
            WHERE id = $1
            RETURNING badges
            "#,
        )
        .bind(id)
        .bind(tokens)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stored.map(|tokens| tokens.iter().filter_map(|t| t.parse::<BadgeId>().ok()).collect()))
    }

    async fn stats(&self, id: i64) -> Result<Option<GroupStats>, StoreError> {
        let totals: Option<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT g.like_count,
                   COUNT(p.id),
                   COALESCE(SUM(octet_length(p.content)), 0)::BIGINT
            FROM groups g
            LEFT JOIN posts p ON p.group_id = g.id
            WHERE g.id = $1
            GROUP BY g.id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some((like_count, memory_count, space_received)) = totals else {
            return Ok(None);
        };

        let days: Vec<NaiveDate> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT (created_at AT TIME ZONE 'UTC')::DATE AS day
            FROM posts
            WHERE group_id = $1
            ORDER BY day DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(GroupStats {
            memory_count: memory_count.max(0) as u64,
            memory_streak_days: current_streak_days(&days),
            space_received_bytes: space_received.max(0) as u64,
            like_count: like_count.max(0) as u64,
        }))
    }
}

#[async_trait]
impl PostRepo for PgStore {
    async fn insert(&self, post: NewPost) -> Result<PostRow, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts
                (id, group_id, nickname, title, content, password_hash,
                 image_url, tags, location, moment, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.group_id)
        .bind(post.nickname)
        .bind(post.title)
        .bind(post.content)
        .bind(post.password_hash)
        .bind(post.image_url)
        .bind(post.tags)
        .bind(post.location)
        .bind(post.moment)
        .bind(post.is_public)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE groups SET post_count = post_count + 1 WHERE id = $1")
            .bind(row.group_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PostRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update(&self, id: Uuid, changes: PostChanges) -> Result<Option<PostRow>, StoreError> {
        Ok(sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET nickname = $2,
                title = $3,
                content = $4,
                image_url = COALESCE($5, image_url),
                tags = COALESCE($6, tags),
                location = COALESCE($7, location),
                moment = COALESCE($8, moment),
                is_public = $9,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.nickname)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.image_url)
        .bind(changes.tags)
        .bind(changes.location)
        .bind(changes.moment)
        .bind(changes.is_public)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let group_id: Option<i64> =
            sqlx::query_scalar("DELETE FROM posts WHERE id = $1 RETURNING group_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(group_id) = group_id else {
            return Ok(false);
        };
        sqlx::query("UPDATE groups SET post_count = GREATEST(post_count - 1, 0) WHERE id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn find(&self, group_id: i64, plan: &ListQueryPlan) -> Result<Vec<PostRow>, StoreError> {
        let mut qb = POSTS.select(Scope::Group(group_id), plan)?;
        Ok(qb.build_query_as::<PostRow>().fetch_all(&self.pool).await?)
    }

    async fn count_matching(&self, group_id: i64, filter: &FilterSpec) -> Result<u64, StoreError> {
        let mut qb = POSTS.count(Scope::Group(group_id), filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn increment_likes(&self, id: Uuid) -> Result<Option<i64>, StoreError> {
        Ok(sqlx::query_scalar(
            "UPDATE posts SET like_count = like_count + 1 WHERE id = $1 RETURNING like_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[async_trait]
impl CommentRepo for PgStore {
    async fn insert(&self, comment: NewComment) -> Result<CommentRow, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (id, post_id, nickname, content, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(comment.post_id)
        .bind(comment.nickname)
        .bind(comment.content)
        .bind(comment.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
            .bind(row.post_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CommentRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, CommentRow>("SELECT * FROM comments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update(
        &self,
        id: Uuid,
        changes: CommentChanges,
    ) -> Result<Option<CommentRow>, StoreError> {
        Ok(sqlx::query_as::<_, CommentRow>(
            r#"
            UPDATE comments
            SET nickname = $2, content = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.nickname)
        .bind(changes.content)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let post_id: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM comments WHERE id = $1 RETURNING post_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(post_id) = post_id else {
            return Ok(false);
        };
        sqlx::query(
            "UPDATE posts SET comment_count = GREATEST(comment_count - 1, 0) WHERE id = $1",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn find(&self, post_id: Uuid, plan: &ListQueryPlan) -> Result<Vec<CommentRow>, StoreError> {
        let mut qb = COMMENTS.select(Scope::Post(post_id), plan)?;
        Ok(qb.build_query_as::<CommentRow>().fetch_all(&self.pool).await?)
    }

    async fn count_matching(&self, post_id: Uuid, filter: &FilterSpec) -> Result<u64, StoreError> {
        let mut qb = COMMENTS.count(Scope::Post(post_id), filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}
