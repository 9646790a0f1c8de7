use std::sync::Arc;

use crate::application::query_cache::QuerySnapshot;
use crate::domain::entities::FeedEntry;

/// What the feed region shows for the current `posts.getAll` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedState {
    /// Nothing fetched yet.
    Loading,
    /// The fetch settled without data.
    Unavailable,
    Ready(Arc<Vec<FeedEntry>>),
}

impl FeedState {
    pub fn from_snapshot(snapshot: Option<&QuerySnapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return FeedState::Loading;
        };
        match snapshot.data.as_ref().and_then(|data| data.as_posts()) {
            Some(posts) => FeedState::Ready(Arc::clone(posts)),
            None => FeedState::Unavailable,
        }
    }
}
