//! Server-side pre-render helper.
//!
//! Pre-rendering runs outside any request, so it gets its own query cache and
//! an anonymous context. The warm entries can then be dehydrated into the
//! rendered page.

use std::sync::Arc;

use chirp_api_types::DehydratedState;

use crate::application::api::ApiClient;
use crate::application::procedures::{AppRouter, ProcedureContext};
use crate::application::query_cache::{QueryClient, QueryError};
use crate::domain::entities::FeedEntry;

pub struct SsgHelper {
    ctx: ProcedureContext,
    client: ApiClient,
}

/// Helper bound to `router`, a fresh [`QueryClient`] and no user.
pub fn generate_ssg_helper(router: AppRouter) -> SsgHelper {
    SsgHelper {
        ctx: ProcedureContext::anonymous(),
        client: ApiClient::new(router, Arc::new(QueryClient::default())),
    }
}

impl SsgHelper {
    pub fn context(&self) -> &ProcedureContext {
        &self.ctx
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn prefetch_posts(&self) {
        self.client.prefetch_posts(&self.ctx).await;
    }

    pub async fn posts(&self) -> Result<Arc<Vec<FeedEntry>>, QueryError> {
        self.client.posts_get_all(&self.ctx).await
    }

    pub fn dehydrate(&self) -> Result<DehydratedState, serde_json::Error> {
        self.client.queries().dehydrate()
    }
}
