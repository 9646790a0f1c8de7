use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use chirp_api_types::procedures;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    application::{
        api::ApiClient,
        auth::IdentityService,
        composer::{ComposerEffect, ComposerState},
        error::{ErrorReport, HttpError},
        feed::FeedState,
        page::PageState,
        procedures::ProcedureContext,
        query_cache::QueryKey,
        repos::HealthRepo,
        ssg::SsgHelper,
        stream::StreamBuilder,
    },
    config::{AuthSettings, SiteSettings},
    infra::assets,
    presentation::views::{
        self, FeedTemplate, FeedView, IndexTemplate, PageMetaView, ShellTemplate, ShellView,
        TemplateRenderError, render_template_response, script_safe_json,
    },
};

use super::{
    middleware::{log_responses, set_request_context},
    procedure_context, rpc, selectors, session_token,
    toasts::{Toast, push_toasts},
};

#[derive(Clone)]
pub struct HttpState {
    pub api: ApiClient,
    pub identity: IdentityService,
    pub health: Arc<dyn HealthRepo>,
    pub site: Arc<SiteSettings>,
    pub auth: Arc<AuthSettings>,
}

pub fn build_router(state: HttpState) -> Router {
    let get_all_path = format!("/api/rpc/{}", procedures::POSTS_GET_ALL);
    let create_path = format!("/api/rpc/{}", procedures::POSTS_CREATE);

    Router::new()
        .route("/", get(index))
        .route("/ui/shell", get(shell_fragment))
        .route("/ui/feed", get(feed_fragment))
        .route("/ui/posts", post(submit_post))
        .route(&get_all_path, get(rpc::posts_get_all))
        .route(&create_path, post(rpc::posts_create))
        .route("/_health/db", get(db_health))
        .route("/static/{*path}", get(assets::serve))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let shell = match resolve_shell(&state, &headers).await {
        Ok(shell) => shell,
        Err(err) => return err.into_response(),
    };
    let shell_html = match views::render_html("infra::http::public::index", &ShellTemplate { shell })
    {
        Ok(html) => html,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let template = IndexTemplate {
        meta: PageMetaView::from_site(&state.site),
        shell_html,
        hydration_json: hydration_json(&state.api),
    };
    render_template_response(template, StatusCode::OK)
}

async fn shell_fragment(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let shell = resolve_shell(&state, &headers).await?.without_retry();
    let html = views::render_html(
        "infra::http::public::shell_fragment",
        &ShellTemplate { shell },
    )?;

    let mut stream = StreamBuilder::new();
    stream.replace(selectors::SHELL, html);
    Ok(stream.into_response())
}

async fn feed_fragment(State(state): State<HttpState>) -> Result<Response, HttpError> {
    if let Err(err) = state
        .api
        .posts_get_all(&ProcedureContext::anonymous())
        .await
    {
        warn!(target = "chirp::http::feed", error = %err, "feed fetch failed");
    }

    let mut stream = StreamBuilder::new();
    stream.replace(selectors::FEED, render_feed(&state)?);
    Ok(stream.into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ComposerSignals {
    content: String,
}

async fn submit_post(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    let signals: ComposerSignals = serde_json::from_slice(&body).map_err(|err| {
        HttpError::from_error(
            "infra::http::public::submit_post",
            StatusCode::BAD_REQUEST,
            "Malformed signals",
            &err,
        )
    })?;

    let mut composer = ComposerState::new(signals.content);
    let mut stream = StreamBuilder::new();
    let Some(input) = composer.on_submit() else {
        return Ok(stream.into_response());
    };

    let ctx = procedure_context(&state, &headers).await;
    let outcome = state.api.create_post(&ctx, input).await;
    let effects = composer.settle(&outcome);

    let mut toasts = Vec::new();
    for effect in effects {
        match effect {
            ComposerEffect::ClearInput => {
                stream
                    .signals(&json!({ "content": composer.content() }))
                    .map_err(|err| {
                        HttpError::from_error(
                            "infra::http::public::submit_post",
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "Internal server error",
                            &err,
                        )
                    })?;
            }
            ComposerEffect::InvalidateFeed => {
                state.api.invalidate_posts();
                if let Err(err) = state.api.posts_get_all(&ctx).await {
                    warn!(target = "chirp::http::feed", error = %err, "feed refresh failed");
                }
                stream.replace(selectors::FEED, render_feed(&state)?);
            }
            ComposerEffect::Notify(text) => {
                info!(
                    target = "chirp::http::composer",
                    message = %text,
                    "post rejected"
                );
                toasts.push(Toast::error(text));
            }
        }
    }

    if !toasts.is_empty() {
        push_toasts(&mut stream, &toasts)?;
    }
    Ok(stream.into_response())
}

async fn db_health(State(state): State<HttpState>) -> Response {
    match state.health.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::public::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn not_found() -> Response {
    let mut response = (StatusCode::NOT_FOUND, "Not found").into_response();
    ErrorReport::from_message(
        "infra::http::public::not_found",
        StatusCode::NOT_FOUND,
        "No route matched",
    )
    .attach(&mut response);
    response
}

/// Prefetch the feed and resolve the caller concurrently, then lay out the
/// shell. A slow prefetch leaves the feed loading instead of holding the page;
/// it runs on its own task so the cache is still warmed after the page is sent.
async fn resolve_shell(state: &HttpState, headers: &HeaderMap) -> Result<ShellView, HttpError> {
    let token = session_token(headers, &state.auth.session_cookie);
    let api = state.api.clone();
    let mut warm_up = tokio::spawn(async move {
        api.prefetch_posts(&ProcedureContext::anonymous()).await;
    });
    let prefetch = tokio::time::timeout(state.auth.resolve_timeout, &mut warm_up);

    let (prefetched, auth) = tokio::join!(prefetch, state.identity.snapshot(token.as_deref()));
    match prefetched {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(target = "chirp::http::feed", error = %err, "feed prefetch task failed"),
        Err(_) => debug!(target = "chirp::http::feed", "prefetch still running, rendering loader"),
    }

    let page = PageState::from_auth(&auth);
    let feed_html = if page.renders_content() {
        render_feed(state)?
    } else {
        String::new()
    };
    Ok(ShellView::new(&page, &state.auth.sign_in_url, feed_html))
}

fn render_feed(state: &HttpState) -> Result<String, HttpError> {
    Ok(feed_html(&state.api)?)
}

fn feed_html(api: &ApiClient) -> Result<String, TemplateRenderError> {
    let snapshot = api.queries().get(QueryKey::PostsGetAll);
    let feed = FeedView::from_state(
        &FeedState::from_snapshot(snapshot.as_ref()),
        OffsetDateTime::now_utc(),
    );
    views::render_html("infra::http::public::feed_html", &FeedTemplate { feed })
}

/// Render the signed-out home page with the feed prefetched through `helper`,
/// embedding the warm cache for hydration.
pub async fn prerender_home(
    helper: &SsgHelper,
    site: &SiteSettings,
    sign_in_url: &str,
) -> Result<String, TemplateRenderError> {
    helper.prefetch_posts().await;

    let page = PageState::SignedOut;
    let shell = ShellView::new(&page, sign_in_url, feed_html(helper.client())?);
    let shell_html = views::render_html(
        "infra::http::public::prerender_home",
        &ShellTemplate { shell },
    )?;

    views::render_html(
        "infra::http::public::prerender_home",
        &IndexTemplate {
            meta: PageMetaView::from_site(site),
            shell_html,
            hydration_json: hydration_json(helper.client()),
        },
    )
}

fn hydration_json(api: &ApiClient) -> Option<String> {
    let state = match api.queries().dehydrate() {
        Ok(state) => state,
        Err(err) => {
            warn!(target = "chirp::http::hydration", error = %err, "dehydrate failed");
            return None;
        }
    };
    if state.queries.is_empty() {
        return None;
    }
    serde_json::to_string(&state)
        .map(|json| script_safe_json(&json))
        .map_err(|err| warn!(target = "chirp::http::hydration", error = %err, "serialize failed"))
        .ok()
}
