use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use crate::errors::{required, required_text, AppError};
use crate::groups::badges::{refresh_badges, refresh_badges_by_id};
use crate::groups::models::{
    GroupRequest, GroupResponse, LikeResponse, MessageResponse, PasswordBody, VisibilityResponse,
};
use crate::listing::{plan_list_query, ListQueryRequest, Page};
use crate::models::group::{GroupChanges, GroupRow, NewGroup};
use crate::passwords::{hash_password, verify_password};
use crate::state::AppState;
use crate::store::GROUP_SORT_KEYS;

pub(crate) async fn load_group(state: &AppState, group_id: i64) -> Result<GroupRow, AppError> {
    state
        .groups
        .get(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {group_id} not found")))
}

/// Rejects with 403 unless `password` matches the group's password.
pub(crate) fn check_group_password(group: &GroupRow, password: &str) -> Result<(), AppError> {
    if verify_password(password, &group.password_hash)? {
        return Ok(());
    }
    warn!(group_id = group.id, "Rejected wrong group password");
    Err(AppError::Forbidden("Incorrect password".to_string()))
}

/// POST /api/groups
pub async fn handle_create_group(
    State(state): State<AppState>,
    Json(req): Json<GroupRequest>,
) -> Result<(StatusCode, Json<GroupResponse>), AppError> {
    let name = required_text(req.name, "name")?;
    let password = required_text(req.password, "password")?;
    let is_public = required(req.is_public, "isPublic")?;

    let group = state
        .groups
        .insert(NewGroup {
            name,
            password_hash: hash_password(&password)?,
            image_url: req.image_url,
            is_public,
            introduction: req.introduction.unwrap_or_default(),
        })
        .await?;
    info!(group_id = group.id, "Created group");

    let group = refresh_badges(state.groups.as_ref(), group, state.config.badge_policy).await?;
    Ok((StatusCode::CREATED, Json(group.into())))
}

/// GET /api/groups
pub async fn handle_list_groups(
    State(state): State<AppState>,
    Query(params): Query<ListQueryRequest>,
) -> Result<Json<Page<GroupResponse>>, AppError> {
    let plan = plan_list_query(&params.with_defaults())?;
    plan.ensure_sort_supported(GROUP_SORT_KEYS)?;

    let total = state.groups.count_matching(&plan.filter).await?;
    let rows = state.groups.find(&plan).await?;
    Ok(Json(Page::new(
        plan.envelope(total),
        rows.into_iter().map(GroupResponse::from).collect(),
    )))
}

/// GET /api/groups/:groupId
pub async fn handle_get_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<GroupResponse>, AppError> {
    Ok(Json(load_group(&state, group_id).await?.into()))
}

/// PUT /api/groups/:groupId
pub async fn handle_update_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Json(req): Json<GroupRequest>,
) -> Result<Json<GroupResponse>, AppError> {
    let name = required_text(req.name, "name")?;
    let password = required_text(req.password, "password")?;
    let is_public = required(req.is_public, "isPublic")?;

    let group = load_group(&state, group_id).await?;
    check_group_password(&group, &password)?;

    let group = state
        .groups
        .update(
            group_id,
            GroupChanges {
                name,
                image_url: req.image_url.filter(|v| !v.is_empty()),
                is_public,
                introduction: req.introduction.filter(|v| !v.is_empty()),
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {group_id} not found")))?;
    info!(group_id, "Updated group");

    let group = refresh_badges(state.groups.as_ref(), group, state.config.badge_policy).await?;
    Ok(Json(group.into()))
}

/// DELETE /api/groups/:groupId
pub async fn handle_delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Json(req): Json<PasswordBody>,
) -> Result<Json<MessageResponse>, AppError> {
    let password = required_text(req.password, "password")?;
    let group = load_group(&state, group_id).await?;
    check_group_password(&group, &password)?;

    state.groups.delete(group_id).await?;
    info!(group_id, "Deleted group");
    Ok(Json(MessageResponse {
        message: "Group deleted",
    }))
}

/// POST /api/groups/:groupId/verify-password
pub async fn handle_verify_password(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Json(req): Json<PasswordBody>,
) -> Result<Json<MessageResponse>, AppError> {
    let password = required_text(req.password, "password")?;
    let group = load_group(&state, group_id).await?;
    if !verify_password(&password, &group.password_hash)? {
        return Err(AppError::Unauthorized("Incorrect password".to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Password verified",
    }))
}

/// POST /api/groups/:groupId/like
pub async fn handle_like_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<LikeResponse>, AppError> {
    let like_count = state
        .groups
        .increment_likes(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {group_id} not found")))?;
    refresh_badges_by_id(state.groups.as_ref(), group_id, state.config.badge_policy).await?;
    Ok(Json(LikeResponse { like_count }))
}

/// GET /api/groups/:groupId/is-public
/// GET /api/groups/:groupId/public-status
pub async fn handle_group_visibility(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> Result<Json<VisibilityResponse>, AppError> {
    let group = load_group(&state, group_id).await?;
    Ok(Json(VisibilityResponse {
        id: group.id,
        is_public: group.is_public,
    }))
}
