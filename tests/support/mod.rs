#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use chirp::application::api::ApiClient;
use chirp::application::auth::IdentityService;
use chirp::application::procedures::{AppRouter, PostProcedureConfig};
use chirp::application::query_cache::QueryClient;
use chirp::application::rate_limit::PostRateLimiter;
use chirp::application::repos::{
    CreatePostParams, CreateSessionParams, CreateUserParams, HealthRepo, PostsRepo,
    PostsWriteRepo, RepoError, SessionsRepo, UsersRepo,
};
use chirp::config::{AuthSettings, SiteSettings};
use chirp::domain::entities::{FeedEntry, PostRecord, SessionRecord, UserRecord};
use chirp::infra::http::{HttpState, build_router};

pub const SESSION_COOKIE: &str = "chirp_session";
pub const SIGN_IN_URL: &str = "/sign-in";

/// Repositories backed by vectors, with switches to simulate outages.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<UserRecord>>,
    sessions: Mutex<Vec<SessionRecord>>,
    posts: Mutex<Vec<PostRecord>>,
    pub posts_down: AtomicBool,
    pub sessions_down: AtomicBool,
    /// Added to every feed read, in milliseconds.
    pub posts_delay_ms: AtomicU64,
}

impl MemoryStore {
    pub async fn seed_post(&self, author_id: Uuid, content: &str, minutes_ago: i64) -> PostRecord {
        let post = PostRecord {
            id: Uuid::new_v4(),
            author_id,
            content: content.to_string(),
            created_at: OffsetDateTime::now_utc() - time::Duration::minutes(minutes_ago),
        };
        self.posts.lock().await.push(post.clone());
        post
    }

    pub async fn post_count(&self) -> usize {
        self.posts.lock().await.len()
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_recent(&self, limit: u32) -> Result<Vec<FeedEntry>, RepoError> {
        let delay = self.posts_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.posts_down.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("posts table unavailable"));
        }
        let users = self.users.lock().await;
        let mut posts = self.posts.lock().await.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let author = users.iter().find(|user| user.id == post.author_id)?;
                Some(FeedEntry {
                    author: author.profile(),
                    post,
                })
            })
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let post = PostRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            content: params.content.into_inner(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.posts.lock().await.push(post.clone());
        Ok(post)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().await;
        if users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            profile_image_url: params.profile_image_url,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(&self, params: CreateSessionParams) -> Result<SessionRecord, RepoError> {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            expires_at: params.expires_at,
            revoked_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.sessions.lock().await.push(session.clone());
        Ok(session)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        if self.sessions_down.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(self
            .sessions
            .lock()
            .await
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn revoke_session(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .iter_mut()
            .find(|session| session.id == id)
            .ok_or(RepoError::NotFound)?;
        session.revoked_at = Some(revoked_at);
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.posts_down.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        Ok(())
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: HttpState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limit(10)
    }

    /// App whose rate limiter admits `max_posts` per minute and author.
    pub fn with_limit(max_posts: u32) -> Self {
        let store = Arc::new(MemoryStore::default());
        let app_router = AppRouter::new(
            store.clone(),
            store.clone(),
            PostRateLimiter::new(Duration::from_secs(60), max_posts),
            PostProcedureConfig::default(),
        );
        let state = HttpState {
            api: ApiClient::new(app_router, Arc::new(QueryClient::default())),
            identity: IdentityService::new(
                store.clone(),
                store.clone(),
                Duration::from_millis(500),
                24,
            ),
            health: store.clone(),
            site: Arc::new(SiteSettings {
                title: "Chirp".to_string(),
                description: "Say it with emoji.".to_string(),
                datastar_script_url: "/static/datastar.js".to_string(),
            }),
            auth: Arc::new(AuthSettings {
                session_cookie: SESSION_COOKIE.to_string(),
                sign_in_url: SIGN_IN_URL.to_string(),
                resolve_timeout: Duration::from_millis(500),
                session_ttl_hours: 24,
            }),
        };
        let router = build_router(state.clone());

        Self {
            store,
            state,
            router,
        }
    }

    /// Create `username` and return a session token for them.
    pub async fn sign_up(&self, username: &str) -> (UserRecord, String) {
        let user = self
            .state
            .identity
            .create_user(username, &format!("https://img.example/{username}.png"))
            .await
            .expect("user should be created");
        let issued = self
            .state
            .identity
            .issue_session(username, None)
            .await
            .expect("session should be issued");
        (user, issued.token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("cookie", format!("{SESSION_COOKIE}={token}"));
    }
    builder.body(Body::empty()).expect("request should build")
}

pub fn post_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).expect("body should be json")
}
