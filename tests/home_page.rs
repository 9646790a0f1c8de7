mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::http::{StatusCode, header::CONTENT_TYPE};
use chirp::application::query_cache::QueryKey;

use support::{SIGN_IN_URL, TestApp, body_text, get};

#[tokio::test]
async fn signed_out_visitor_sees_feed_and_sign_in_link() {
    let app = TestApp::new();
    let (ada, _) = app.sign_up("ada").await;
    app.store.seed_post(ada.id, "🐦", 5).await;
    app.store.seed_post(ada.id, "🌮🌮", 1).await;

    let response = app.send(get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let html = body_text(response).await;
    assert!(html.contains(&format!("href=\"{SIGN_IN_URL}\"")));
    assert!(!html.contains("composer-input"));
    assert!(html.contains("@ada"));
    assert!(html.contains("5 minutes ago"));

    let newest = html.find("🌮🌮").expect("newest post rendered");
    let oldest = html.find("🐦").expect("oldest post rendered");
    assert!(newest < oldest, "feed must be newest first");
}

#[tokio::test]
async fn home_page_embeds_the_prefetched_feed_for_hydration() {
    let app = TestApp::new();
    let (ada, _) = app.sign_up("ada").await;
    app.store.seed_post(ada.id, "🐦", 2).await;

    let html = body_text(app.send(get("/", None)).await).await;

    let start = html
        .find("<script type=\"application/json\" id=\"chirp-state\">")
        .expect("hydration script present");
    let json_start = html[start..].find('>').expect("script tag closes") + start + 1;
    let json_end = html[json_start..]
        .find("</script>")
        .expect("script closes")
        + json_start;
    let state: serde_json::Value =
        serde_json::from_str(&html[json_start..json_end]).expect("hydration json parses");

    assert_eq!(state["queries"][0]["key"], "posts.getAll");
    assert_eq!(state["queries"][0]["data"][0]["post"]["content"], "🐦");
    assert_eq!(state["queries"][0]["data"][0]["author"]["username"], "ada");
}

#[tokio::test]
async fn signed_in_visitor_sees_the_composer() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;

    let html = body_text(app.send(get("/", Some(&token))).await).await;

    assert!(html.contains("composer-input"));
    assert!(html.contains("Type some emojis!"));
    assert!(html.contains("https://img.example/ada.png"));
    assert!(!html.contains("class=\"sign-in\""));
}

#[tokio::test]
async fn unknown_session_reads_as_signed_out() {
    let app = TestApp::new();

    let html = body_text(app.send(get("/", Some("cs_nope_0123456789abcdef0123456789abcdef"))).await).await;

    assert!(html.contains("class=\"sign-in\""));
    assert!(!html.contains("composer-input"));
}

#[tokio::test]
async fn unresolved_identity_renders_only_the_pending_shell() {
    let app = TestApp::new();
    let (ada, token) = app.sign_up("ada").await;
    app.store.seed_post(ada.id, "🐦", 1).await;
    app.store.sessions_down.store(true, Ordering::SeqCst);

    let html = body_text(app.send(get("/", Some(&token))).await).await;

    assert!(html.contains("data-init=\"@get('/ui/shell')\""));
    assert!(!html.contains("id=\"feed\""));
    assert!(!html.contains("class=\"sign-in\""));
    assert!(!html.contains("composer-input"));
}

#[tokio::test]
async fn shell_fragment_does_not_reschedule_itself() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;
    app.store.sessions_down.store(true, Ordering::SeqCst);

    let response = app.send(get("/ui/shell", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "text/event-stream"
    );

    let body = body_text(response).await;
    assert!(body.contains("id=\"shell\""));
    assert!(!body.contains("/ui/shell"));
}

#[tokio::test]
async fn shell_fragment_swaps_in_the_composer_once_identity_resolves() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;

    let body = body_text(app.send(get("/ui/shell", Some(&token))).await).await;

    assert!(body.contains("#shell"));
    assert!(body.contains("composer-input"));
}

#[tokio::test]
async fn failing_feed_query_shows_error_state() {
    let app = TestApp::new();
    app.store.posts_down.store(true, Ordering::SeqCst);

    let html = body_text(app.send(get("/", None)).await).await;

    assert!(html.contains("Something went wrong"));
    assert!(!html.contains("chirp-state"));
}

#[tokio::test]
async fn slow_prefetch_still_warms_the_cache_after_the_page_is_sent() {
    let app = TestApp::new();
    let (ada, _) = app.sign_up("ada").await;
    app.store.seed_post(ada.id, "🐢", 1).await;
    app.store.posts_delay_ms.store(800, Ordering::SeqCst);

    let page = app.send(get("/", None)).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(app.state.api.queries().get(QueryKey::PostsGetAll).is_none());

    tokio::time::sleep(Duration::from_millis(1_200)).await;

    let snapshot = app
        .state
        .api
        .queries()
        .get(QueryKey::PostsGetAll)
        .expect("prefetch finished in the background");
    let posts = snapshot.data.expect("posts cached");
    assert_eq!(posts.as_posts().map(|posts| posts.len()), Some(1));
}

#[tokio::test]
async fn feed_fragment_patches_the_feed() {
    let app = TestApp::new();
    let (ada, _) = app.sign_up("ada").await;
    app.store.seed_post(ada.id, "🍕", 3).await;

    let body = body_text(app.send(get("/ui/feed", None)).await).await;

    assert!(body.contains("#feed"));
    assert!(body.contains("🍕"));
}

#[tokio::test]
async fn database_health_reflects_the_store() {
    let app = TestApp::new();
    assert_eq!(
        app.send(get("/_health/db", None)).await.status(),
        StatusCode::NO_CONTENT
    );

    app.store.posts_down.store(true, Ordering::SeqCst);
    assert_eq!(
        app.send(get("/_health/db", None)).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn static_assets_and_unknown_routes() {
    let app = TestApp::new();

    let css = app.send(get("/static/app.css", None)).await;
    assert_eq!(css.status(), StatusCode::OK);
    assert_eq!(css.headers().get(CONTENT_TYPE).expect("content type"), "text/css");

    let missing = app.send(get("/nowhere", None)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
