mod support;

use std::collections::HashSet;

use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;

use support::{TestApp, get, post_json};

#[tokio::test]
async fn procedures_and_cache_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = TestApp::new();
    let (_, token) = app.sign_up("ada").await;

    app.send(get("/api/rpc/posts.getAll", None)).await;
    app.send(get("/api/rpc/posts.getAll", None)).await;
    app.send(post_json(
        "/api/rpc/posts.create",
        Some(&token),
        json!({ "content": "🐦" }),
    ))
    .await;
    app.send(post_json(
        "/api/rpc/posts.create",
        Some(&token),
        json!({ "content": "nope" }),
    ))
    .await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "chirp_query_cache_hit_total",
        "chirp_query_cache_miss_total",
        "chirp_query_cache_invalidate_total",
        "chirp_posts_created_total",
        "chirp_posts_rejected_total",
    ];
    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
