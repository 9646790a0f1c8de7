mod support;

use std::sync::atomic::Ordering;

use axum::http::{StatusCode, header::RETRY_AFTER};
use serde_json::json;

use support::{TestApp, body_json, body_text, get, post_json};

#[tokio::test]
async fn get_all_returns_feed_entries_newest_first() {
    let app = TestApp::new();
    let (ada, _) = app.sign_up("ada").await;
    app.store.seed_post(ada.id, "🐦", 10).await;
    app.store.seed_post(ada.id, "🌮", 1).await;

    let response = app.send(get("/api/rpc/posts.getAll", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let data = body["result"]["data"].as_array().expect("data array");
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["post"]["content"], "🌮");
    assert_eq!(data[1]["post"]["content"], "🐦");
    assert_eq!(data[0]["author"]["username"], "ada");
    assert_eq!(data[0]["author"]["profileImageUrl"], "https://img.example/ada.png");
}

#[tokio::test]
async fn get_all_failure_is_an_internal_error() {
    let app = TestApp::new();
    app.store.posts_down.store(true, Ordering::SeqCst);

    let response = app.send(get("/api/rpc/posts.getAll", None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
}

#[tokio::test]
async fn create_requires_a_session() {
    let app = TestApp::new();

    let response = app
        .send(post_json("/api/rpc/posts.create", None, json!({ "content": "🐦" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn create_persists_and_refreshes_the_feed() {
    let app = TestApp::new();
    let (ada, token) = app.sign_up("ada").await;

    // Warm the cache so the next read must observe the invalidation.
    let before = body_json(app.send(get("/api/rpc/posts.getAll", None)).await).await;
    assert_eq!(before["result"]["data"].as_array().map(Vec::len), Some(0));

    let response = app
        .send(post_json(
            "/api/rpc/posts.create",
            Some(&token),
            json!({ "content": "🐦🐦" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    assert_eq!(created["result"]["data"]["content"], "🐦🐦");
    assert_eq!(created["result"]["data"]["authorId"], ada.id.to_string());

    let after = body_json(app.send(get("/api/rpc/posts.getAll", None)).await).await;
    assert_eq!(after["result"]["data"][0]["post"]["content"], "🐦🐦");
}

#[tokio::test]
async fn create_rejects_non_emoji_content_with_field_errors() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;

    let response = app
        .send(post_json(
            "/api/rpc/posts.create",
            Some(&token),
            json!({ "content": "hello" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(
        body["error"]["data"]["fieldErrors"]["content"][0],
        "Only emojis are allowed"
    );
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn create_rejects_malformed_json() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/rpc/posts.create")
        .header("authorization", format!("Bearer {token}"))
        .body(axum::body::Body::from("{not json"))
        .expect("request should build");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn create_is_rate_limited_per_author() {
    let app = TestApp::with_limit(1);
    let (_, token) = app.sign_up("ada").await;

    let first = app
        .send(post_json(
            "/api/rpc/posts.create",
            Some(&token),
            json!({ "content": "🐦" }),
        ))
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .send(post_json(
            "/api/rpc/posts.create",
            Some(&token),
            json!({ "content": "🐦" }),
        ))
        .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        second.headers().get(RETRY_AFTER).expect("retry-after"),
        "60"
    );
    assert_eq!(body_json(second).await["error"]["code"], "TOO_MANY_REQUESTS");
    assert_eq!(app.store.post_count().await, 1);
}

fn composer_post(token: &str, content: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri("/ui/posts")
        .header("content-type", "application/json")
        .header("cookie", format!("{}={token}", support::SESSION_COOKIE))
        .header("datastar-request", "true")
        .body(axum::body::Body::from(json!({ "content": content }).to_string()))
        .expect("request should build")
}

#[tokio::test]
async fn composer_submit_clears_input_and_patches_feed() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;

    let response = app.send(composer_post(&token, "🎉")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains(r#"{"content":""}"#));
    assert!(body.contains("#feed"));
    assert!(body.contains("🎉"));
    assert!(!body.contains("toast-error"));
    assert_eq!(app.store.post_count().await, 1);
}

#[tokio::test]
async fn composer_rejection_keeps_input_and_raises_toast() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;

    let body = body_text(app.send(composer_post(&token, "abc")).await).await;

    assert!(body.contains("#toast-stack"));
    assert!(body.contains("toast-error"));
    assert!(body.contains("Only emojis are allowed"));
    assert!(!body.contains(r#"{"content":""}"#));
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn composer_ignores_empty_submissions() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;

    let response = app.send(composer_post(&token, "")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(!body.contains("datastar"));
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn anonymous_composer_submit_raises_generic_toast() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/ui/posts")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(json!({ "content": "🐦" }).to_string()))
        .expect("request should build");
    let body = body_text(app.send(request).await).await;

    assert!(body.contains("Failed to post, please try again."));
    assert_eq!(app.store.post_count().await, 0);
}
