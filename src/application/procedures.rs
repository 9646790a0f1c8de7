//! Typed procedures behind the feed: the `posts.getAll` query and the
//! `posts.create` mutation.
//!
//! Both the page handlers (through [`crate::application::api::ApiClient`]) and
//! the JSON endpoint call into [`AppRouter`], so validation, rate limiting and
//! the double-submit guard apply the same way on every surface.

use std::sync::Arc;

use axum::http::StatusCode;
use chirp_api_types::{CreatePostInput, codes};
use dashmap::DashMap;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::rate_limit::PostRateLimiter;
use crate::application::repos::{CreatePostParams, PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::entities::{FeedEntry, PostRecord};
use crate::domain::posts::{ContentRules, FieldErrors, PostContent};

pub const DEFAULT_FEED_LIMIT: u32 = 100;

/// Who is calling a procedure. Pre-rendering runs with no user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcedureContext {
    user_id: Option<Uuid>,
}

impl ProcedureContext {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }
}

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("invalid input: {0}")]
    Validation(FieldErrors),
    #[error("sign-in required")]
    Unauthorized,
    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },
    #[error("a post from this author is already being submitted")]
    Conflict,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl ProcedureError {
    pub fn code(&self) -> &'static str {
        match self {
            ProcedureError::Validation(_) => codes::BAD_REQUEST,
            ProcedureError::Unauthorized => codes::UNAUTHORIZED,
            ProcedureError::TooManyRequests { .. } => codes::TOO_MANY_REQUESTS,
            ProcedureError::Conflict => codes::CONFLICT,
            ProcedureError::Repo(_) => codes::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProcedureError::Validation(_) => StatusCode::BAD_REQUEST,
            ProcedureError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProcedureError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProcedureError::Conflict => StatusCode::CONFLICT,
            ProcedureError::Repo(RepoError::Timeout) => StatusCode::SERVICE_UNAVAILABLE,
            ProcedureError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            ProcedureError::Validation(_) => "Invalid input",
            ProcedureError::Unauthorized => "Sign in to post",
            ProcedureError::TooManyRequests { .. } => "Too many posts, slow down",
            ProcedureError::Conflict => "Post already in progress",
            ProcedureError::Repo(_) => "Internal server error",
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ProcedureError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PostProcedureConfig {
    pub rules: ContentRules,
    pub feed_limit: u32,
}

impl Default for PostProcedureConfig {
    fn default() -> Self {
        Self {
            rules: ContentRules::default(),
            feed_limit: DEFAULT_FEED_LIMIT,
        }
    }
}

/// Root of the procedure tree.
#[derive(Clone)]
pub struct AppRouter {
    posts: PostsProcedures,
}

impl AppRouter {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writes: Arc<dyn PostsWriteRepo>,
        limiter: PostRateLimiter,
        config: PostProcedureConfig,
    ) -> Self {
        Self {
            posts: PostsProcedures {
                posts,
                writes,
                limiter,
                in_flight: InFlightSubmissions::new(),
                config,
            },
        }
    }

    pub fn posts(&self) -> &PostsProcedures {
        &self.posts
    }
}

#[derive(Clone)]
pub struct PostsProcedures {
    posts: Arc<dyn PostsRepo>,
    writes: Arc<dyn PostsWriteRepo>,
    limiter: PostRateLimiter,
    in_flight: InFlightSubmissions,
    config: PostProcedureConfig,
}

impl PostsProcedures {
    /// `posts.getAll`: newest posts with their authors.
    pub async fn get_all(&self, _ctx: &ProcedureContext) -> Result<Vec<FeedEntry>, ProcedureError> {
        let entries = self.posts.list_recent(self.config.feed_limit).await?;
        debug!(
            target = "chirp::procedures",
            count = entries.len(),
            "posts.getAll"
        );
        Ok(entries)
    }

    /// `posts.create`: validate, guard and persist a post for the caller.
    pub async fn create(
        &self,
        ctx: &ProcedureContext,
        input: CreatePostInput,
    ) -> Result<PostRecord, ProcedureError> {
        let result = self.create_inner(ctx, input).await;
        match &result {
            Ok(post) => {
                counter!("chirp_posts_created_total").increment(1);
                info!(
                    target = "chirp::procedures",
                    post_id = %post.id,
                    author_id = %post.author_id,
                    "post created"
                );
            }
            Err(err) => {
                counter!("chirp_posts_rejected_total", "code" => err.code()).increment(1);
                debug!(
                    target = "chirp::procedures",
                    code = err.code(),
                    error = %err,
                    "post rejected"
                );
            }
        }
        result
    }

    async fn create_inner(
        &self,
        ctx: &ProcedureContext,
        input: CreatePostInput,
    ) -> Result<PostRecord, ProcedureError> {
        let author_id = ctx.user_id().ok_or(ProcedureError::Unauthorized)?;
        let content = PostContent::parse(&input.content, &self.config.rules)
            .map_err(ProcedureError::Validation)?;

        let _guard = self
            .in_flight
            .acquire(author_id)
            .ok_or(ProcedureError::Conflict)?;

        if !self.limiter.has_capacity(author_id) {
            return Err(ProcedureError::TooManyRequests {
                retry_after_secs: self.limiter.retry_after_secs(),
            });
        }

        // The in-flight guard keeps check and record atomic per author.
        let post = self
            .writes
            .create_post(CreatePostParams { author_id, content })
            .await?;
        self.limiter.record(author_id);
        Ok(post)
    }
}

/// Authors with a `posts.create` currently running.
#[derive(Clone, Default)]
pub struct InFlightSubmissions {
    authors: Arc<DashMap<Uuid, ()>>,
}

impl InFlightSubmissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the author's slot; `None` when a submission is already running.
    pub fn acquire(&self, author_id: Uuid) -> Option<SubmissionGuard> {
        use dashmap::mapref::entry::Entry;

        match self.authors.entry(author_id) {
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(SubmissionGuard {
                    author_id,
                    authors: Arc::clone(&self.authors),
                })
            }
            Entry::Occupied(_) => None,
        }
    }

    #[cfg(test)]
    fn is_in_flight(&self, author_id: Uuid) -> bool {
        self.authors.contains_key(&author_id)
    }
}

pub struct SubmissionGuard {
    author_id: Uuid,
    authors: Arc<DashMap<Uuid, ()>>,
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.authors.remove(&self.author_id);
    }
}
