use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::comments::models::{CommentRequest, CommentResponse};
use crate::errors::{required_text, AppError};
use crate::groups::models::{MessageResponse, PasswordBody};
use crate::listing::{plan_list_query, ListQueryRequest, Page};
use crate::models::comment::{CommentChanges, CommentRow, NewComment};
use crate::passwords::{hash_password, verify_password};
use crate::posts::handlers::load_post;
use crate::state::AppState;
use crate::store::COMMENT_SORT_KEYS;

async fn load_comment(state: &AppState, comment_id: Uuid) -> Result<CommentRow, AppError> {
    state
        .comments
        .get(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {comment_id} not found")))
}

fn check_comment_password(comment: &CommentRow, password: &str) -> Result<(), AppError> {
    if verify_password(password, &comment.password_hash)? {
        return Ok(());
    }
    warn!(comment_id = %comment.id, "Rejected wrong comment password");
    Err(AppError::Forbidden("Incorrect password".to_string()))
}

/// POST /api/posts/:postId/comments
pub async fn handle_create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let nickname = required_text(req.nickname, "nickname")?;
    let content = required_text(req.content, "content")?;
    let password = required_text(req.password, "password")?;
    load_post(&state, post_id).await?;

    let comment = state
        .comments
        .insert(NewComment {
            post_id,
            nickname,
            content,
            password_hash: hash_password(&password)?,
        })
        .await?;
    info!(comment_id = %comment.id, %post_id, "Created comment");
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// GET /api/posts/:postId/comments
pub async fn handle_list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(params): Query<ListQueryRequest>,
) -> Result<Json<Page<CommentResponse>>, AppError> {
    let plan = plan_list_query(&params.with_defaults())?;
    plan.ensure_sort_supported(COMMENT_SORT_KEYS)?;
    load_post(&state, post_id).await?;

    let total = state.comments.count_matching(post_id, &plan.filter).await?;
    let rows = state.comments.find(post_id, &plan).await?;
    Ok(Json(Page::new(
        plan.envelope(total),
        rows.into_iter().map(CommentResponse::from).collect(),
    )))
}

/// PUT /api/comments/:commentId
pub async fn handle_update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let nickname = required_text(req.nickname, "nickname")?;
    let content = required_text(req.content, "content")?;
    let password = required_text(req.password, "password")?;

    let comment = load_comment(&state, comment_id).await?;
    check_comment_password(&comment, &password)?;

    let comment = state
        .comments
        .update(comment_id, CommentChanges { nickname, content })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {comment_id} not found")))?;
    info!(%comment_id, "Updated comment");
    Ok(Json(comment.into()))
}

/// DELETE /api/comments/:commentId
pub async fn handle_delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Json(req): Json<PasswordBody>,
) -> Result<Json<MessageResponse>, AppError> {
    let password = required_text(req.password, "password")?;
    let comment = load_comment(&state, comment_id).await?;
    check_comment_password(&comment, &password)?;

    state.comments.delete(comment_id).await?;
    info!(%comment_id, "Deleted comment");
    Ok(Json(MessageResponse {
        message: "Comment deleted",
    }))
}
