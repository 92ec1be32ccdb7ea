use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{required, required_text, AppError};
use crate::groups::badges::refresh_badges_by_id;
use crate::groups::handlers::{check_group_password, load_group};
use crate::groups::models::{LikeResponse, MessageResponse};
use crate::listing::{plan_list_query, ListQueryRequest, Page};
use crate::models::post::{NewPost, PostChanges, PostRow};
use crate::passwords::{hash_password, verify_password};
use crate::posts::models::{CreatePostRequest, PostPasswordBody, PostResponse, UpdatePostRequest};
use crate::state::AppState;
use crate::store::POST_SORT_KEYS;

pub(crate) async fn load_post(state: &AppState, post_id: Uuid) -> Result<PostRow, AppError> {
    state
        .posts
        .get(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {post_id} not found")))
}

fn check_post_password(post: &PostRow, password: &str) -> Result<(), AppError> {
    if verify_password(password, &post.password_hash)? {
        return Ok(());
    }
    warn!(post_id = %post.id, "Rejected wrong post password");
    Err(AppError::Forbidden("Incorrect password".to_string()))
}

/// POST /api/groups/:groupId/posts
pub async fn handle_create_post(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let nickname = required_text(req.nickname, "nickname")?;
    let title = required_text(req.title, "title")?;
    let content = required_text(req.content, "content")?;
    let post_password = required_text(req.post_password, "postPassword")?;
    let group_password = required_text(req.group_password, "groupPassword")?;
    let moment = required(req.moment, "moment")?;
    let is_public = required(req.is_public, "isPublic")?;

    let group = load_group(&state, group_id).await?;
    check_group_password(&group, &group_password)?;

    let post = state
        .posts
        .insert(NewPost {
            group_id,
            nickname,
            title,
            content,
            password_hash: hash_password(&post_password)?,
            image_url: req.image_url,
            tags: req.tags.unwrap_or_default(),
            location: req.location,
            moment,
            is_public,
        })
        .await?;
    info!(post_id = %post.id, group_id, "Created post");

    refresh_badges_by_id(state.groups.as_ref(), group_id, state.config.badge_policy).await?;
    Ok(Json(post.into()))
}

/// GET /api/groups/:groupId/posts
pub async fn handle_list_posts(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Query(params): Query<ListQueryRequest>,
) -> Result<Json<Page<PostResponse>>, AppError> {
    let plan = plan_list_query(&params.with_defaults())?;
    plan.ensure_sort_supported(POST_SORT_KEYS)?;
    load_group(&state, group_id).await?;

    let total = state.posts.count_matching(group_id, &plan.filter).await?;
    let rows = state.posts.find(group_id, &plan).await?;
    Ok(Json(Page::new(
        plan.envelope(total),
        rows.into_iter().map(PostResponse::from).collect(),
    )))
}

/// GET /api/posts/:postId
pub async fn handle_get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostResponse>, AppError> {
    Ok(Json(load_post(&state, post_id).await?.into()))
}

/// PUT /api/posts/:postId
pub async fn handle_update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let nickname = required_text(req.nickname, "nickname")?;
    let title = required_text(req.title, "title")?;
    let content = required_text(req.content, "content")?;
    let post_password = required_text(req.post_password, "postPassword")?;
    let is_public = required(req.is_public, "isPublic")?;

    let post = load_post(&state, post_id).await?;
    check_post_password(&post, &post_password)?;

    let post = state
        .posts
        .update(
            post_id,
            PostChanges {
                nickname,
                title,
                content,
                image_url: req.image_url,
                tags: req.tags,
                location: req.location,
                moment: req.moment,
                is_public,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {post_id} not found")))?;
    info!(post_id = %post.id, "Updated post");

    refresh_badges_by_id(state.groups.as_ref(), post.group_id, state.config.badge_policy).await?;
    Ok(Json(post.into()))
}

/// DELETE /api/posts/:postId
pub async fn handle_delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<PostPasswordBody>,
) -> Result<Json<MessageResponse>, AppError> {
    let post_password = required_text(req.post_password, "postPassword")?;
    let post = load_post(&state, post_id).await?;
    check_post_password(&post, &post_password)?;

    state.posts.delete(post_id).await?;
    info!(%post_id, group_id = post.group_id, "Deleted post");

    refresh_badges_by_id(state.groups.as_ref(), post.group_id, state.config.badge_policy).await?;
    Ok(Json(MessageResponse {
        message: "Post deleted",
    }))
}

/// POST /api/posts/:postId/like
pub async fn handle_like_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikeResponse>, AppError> {
    let like_count = state
        .posts
        .increment_likes(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {post_id} not found")))?;
    Ok(Json(LikeResponse { like_count }))
}
