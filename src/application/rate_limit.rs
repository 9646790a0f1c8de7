use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Sliding-window limit on how many posts one author may create.
#[derive(Debug, Clone)]
pub struct PostRateLimiter {
    window: Duration,
    max_posts: u32,
    buckets: Arc<DashMap<Uuid, Vec<Instant>>>,
}

impl PostRateLimiter {
    pub fn new(window: Duration, max_posts: u32) -> Self {
        Self {
            window,
            max_posts,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Whether `author` may create another post now. Nothing is recorded;
    /// call [`Self::record`] once the post is stored.
    pub fn has_capacity(&self, author: Uuid) -> bool {
        self.has_capacity_at(author, Instant::now())
    }

    /// Count a stored post against `author`'s window.
    pub fn record(&self, author: Uuid) {
        self.record_at(author, Instant::now())
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    fn has_capacity_at(&self, author: Uuid, now: Instant) -> bool {
        let window = self.window;
        let recent = match self.buckets.get_mut(&author) {
            Some(mut stamps) => {
                stamps.retain(|instant| now.saturating_duration_since(*instant) < window);
                stamps.len()
            }
            None => 0,
        };
        if recent == 0 {
            self.buckets.remove_if(&author, |_, stamps| stamps.is_empty());
        }
        (recent as u32) < self.max_posts
    }

    fn record_at(&self, author: Uuid, now: Instant) {
        let window = self.window;
        // Authors who stopped posting would otherwise keep their bucket forever.
        self.buckets.retain(|_, stamps| {
            stamps.retain(|instant| now.saturating_duration_since(*instant) < window);
            !stamps.is_empty()
        });
        self.buckets.entry(author).or_default().push(now);
    }
}
