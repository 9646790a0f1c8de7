//! Typed client over the procedure router and the query cache.
//!
//! Reads go through the [`QueryClient`] so the page, the feed fragment and the
//! pre-render helper share cached results. Mutations go straight to the
//! router; the caller decides when to invalidate.

use std::sync::Arc;

use chirp_api_types::{AuthorDto, CreatePostInput, FeedEntryDto, PostDto};

use crate::application::procedures::{AppRouter, ProcedureContext, ProcedureError};
use crate::application::query_cache::{QueryClient, QueryData, QueryError, QueryKey};
use crate::domain::entities::{FeedEntry, PostRecord, UserProfile};

#[derive(Clone)]
pub struct ApiClient {
    router: AppRouter,
    queries: Arc<QueryClient>,
}

impl ApiClient {
    pub fn new(router: AppRouter, queries: Arc<QueryClient>) -> Self {
        Self { router, queries }
    }

    pub fn router(&self) -> &AppRouter {
        &self.router
    }

    pub fn queries(&self) -> &Arc<QueryClient> {
        &self.queries
    }

    /// `posts.getAll`, cache-first.
    pub async fn posts_get_all(
        &self,
        ctx: &ProcedureContext,
    ) -> Result<Arc<Vec<FeedEntry>>, QueryError> {
        let data = self
            .queries
            .fetch(QueryKey::PostsGetAll, || self.load_posts(ctx))
            .await?;
        Ok(posts_of(data))
    }

    /// Warm `posts.getAll`; failures are recorded on the cache entry only.
    pub async fn prefetch_posts(&self, ctx: &ProcedureContext) {
        self.queries
            .prefetch(QueryKey::PostsGetAll, || self.load_posts(ctx))
            .await;
    }

    pub async fn create_post(
        &self,
        ctx: &ProcedureContext,
        input: CreatePostInput,
    ) -> Result<PostRecord, ProcedureError> {
        self.router.posts().create(ctx, input).await
    }

    pub fn invalidate_posts(&self) -> bool {
        self.queries.invalidate(QueryKey::PostsGetAll)
    }

    async fn load_posts(&self, ctx: &ProcedureContext) -> Result<QueryData, ProcedureError> {
        let entries = self.router.posts().get_all(ctx).await?;
        Ok(QueryData::Posts(Arc::new(entries)))
    }
}

fn posts_of(data: QueryData) -> Arc<Vec<FeedEntry>> {
    match data {
        QueryData::Posts(posts) => posts,
    }
}

impl From<&PostRecord> for PostDto {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            content: post.content.clone(),
            created_at: post.created_at,
        }
    }
}

impl From<&UserProfile> for AuthorDto {
    fn from(author: &UserProfile) -> Self {
        Self {
            id: author.id,
            username: author.username.clone(),
            profile_image_url: author.profile_image_url.clone(),
        }
    }
}

impl From<&FeedEntry> for FeedEntryDto {
    fn from(entry: &FeedEntry) -> Self {
        Self {
            post: PostDto::from(&entry.post),
            author: AuthorDto::from(&entry.author),
        }
    }
}
