pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::comments::handlers as comments;
use crate::groups::handlers as groups;
use crate::posts::handlers as posts;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Groups
        .route(
            "/api/groups",
            post(groups::handle_create_group).get(groups::handle_list_groups),
        )
        .route(
            "/api/groups/:groupId",
            get(groups::handle_get_group)
                .put(groups::handle_update_group)
                .delete(groups::handle_delete_group),
        )
        .route(
            "/api/groups/:groupId/verify-password",
            post(groups::handle_verify_password),
        )
        .route("/api/groups/:groupId/like", post(groups::handle_like_group))
        .route(
            "/api/groups/:groupId/is-public",
            get(groups::handle_group_visibility),
        )
        .route(
            "/api/groups/:groupId/public-status",
            get(groups::handle_group_visibility),
        )
        // Posts (memories)
        .route(
            "/api/groups/:groupId/posts",
            post(posts::handle_create_post).get(posts::handle_list_posts),
        )
        .route(
            "/api/posts/:postId",
            get(posts::handle_get_post)
                .put(posts::handle_update_post)
                .delete(posts::handle_delete_post),
        )
        .route("/api/posts/:postId/like", post(posts::handle_like_post))
        // Comments
        .route(
            "/api/posts/:postId/comments",
            post(comments::handle_create_comment).get(comments::handle_list_comments),
        )
        .route(
            "/api/comments/:commentId",
            axum::routing::put(comments::handle_update_comment)
                .delete(comments::handle_delete_comment),
        )
        .with_state(state)
}
