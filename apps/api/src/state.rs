use std::sync::Arc;

use crate::config::Config;
use crate::store::{CommentRepo, GroupRepo, PostRepo};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub groups: Arc<dyn GroupRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub comments: Arc<dyn CommentRepo>,
    pub config: Config,
}

impl AppState {
    /// Wires one backend into all three repository slots.
    pub fn new<S>(store: Arc<S>, config: Config) -> Self
    where
        S: GroupRepo + PostRepo + CommentRepo + 'static,
    {
        Self {
            groups: store.clone(),
            posts: store.clone(),
            comments: store,
            config,
        }
    }
}
