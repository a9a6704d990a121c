//! End-to-end submission tests over the full router: legacy
//! fire-and-forget, synchronous submit-and-wait, caching, capacity
//! control, and executor-state endpoints.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::*;
use weft_core::digest::payload_digest;
use weft_executor::Executor;

fn json_request(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn cache_entry_count(cache_dir: &std::path::Path) -> usize {
    let mut count = 0;
    let mut dir = tokio::fs::read_dir(cache_dir).await.unwrap();
    while let Some(entry) = dir.next_entry().await.unwrap() {
        if !entry.file_name().to_string_lossy().starts_with('.') {
            count += 1;
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Legacy fire-and-forget path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn legacy_submit_queues_and_returns_prompt_id() {
    let test = build_test_app(100).await;

    let body = serde_json::json!({"prompt": valid_prompt()});
    let response = test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;

    // The id is a real UUID, the first default-priority number is 0.
    uuid::Uuid::parse_str(json["prompt_id"].as_str().unwrap()).unwrap();
    assert_eq!(json["number"], 0.0);
    assert_eq!(json["node_errors"], serde_json::json!({}));

    // Queue depth increased by one immediately.
    assert_eq!(test.state.executor.tasks_remaining().await, 1);
    assert_eq!(test.enqueues.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn legacy_submit_honors_explicit_number() {
    let test = build_test_app(100).await;

    let body = serde_json::json!({"prompt": valid_prompt(), "number": -5.0});
    let response = test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();

    let json = json_body(response).await;
    assert_eq!(json["number"], -5.0);
}

#[tokio::test]
async fn legacy_submit_front_negates_the_counter() {
    let test = build_test_app(100).await;

    // First submission takes counter value 0.
    let body = serde_json::json!({"prompt": valid_prompt()});
    test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();

    // Second asks for front-of-queue placement.
    let body = serde_json::json!({"prompt": valid_prompt(), "front": true});
    let response = test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();

    let json = json_body(response).await;
    assert_eq!(json["number"], -1.0);
}

#[tokio::test]
async fn legacy_submit_invalid_prompt_is_rejected_with_node_errors() {
    let test = build_test_app(100).await;

    let body = serde_json::json!({"prompt": {
        "9": {"class_type": "DoesNotExist", "inputs": {}},
    }});
    let response = test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("invalid nodes"));
    assert_eq!(json["node_errors"]["9"]["type"], "unknown_class_type");

    // Never enqueued.
    assert_eq!(test.state.executor.tasks_remaining().await, 0);
}

#[tokio::test]
async fn legacy_submit_without_prompt_is_rejected() {
    let test = build_test_app(100).await;

    let response = test
        .app
        .clone()
        .oneshot(json_request("/prompt", &serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "no prompt");
}

#[tokio::test]
async fn queue_depth_drops_once_the_executor_completes() {
    let test = build_test_app(100).await;

    let body = serde_json::json!({"prompt": valid_prompt()});
    test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();
    assert_eq!(test.state.executor.tasks_remaining().await, 1);

    let _runner = spawn_runner(test.queue.clone(), |_| Ok(Default::default()));

    // The runner drains the queue shortly after.
    let mut remaining = 1;
    for _ in 0..100 {
        remaining = test.state.executor.tasks_remaining().await;
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(remaining, 0);
}

// ---------------------------------------------------------------------------
// Synchronous submit-and-wait path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_submit_rejects_over_capacity_without_side_effects() {
    let test = build_test_app(0).await;

    // One pending job pushes the depth over the zero ceiling.
    let body = serde_json::json!({"prompt": valid_prompt()});
    test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();

    let response = test
        .app
        .clone()
        .oneshot(json_request("/api/v1/prompts", &valid_prompt()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = json_body(response).await;
    assert_eq!(json["depth"], 1);
    assert_eq!(json["limit"], 0);

    // The rejected submission was never enqueued.
    assert_eq!(test.state.executor.tasks_remaining().await, 1);
}

#[tokio::test]
async fn sync_submit_rejects_empty_prompt() {
    let test = build_test_app(100).await;

    let response = test
        .app
        .clone()
        .oneshot(json_request("/api/v1/prompts", &serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sync_submit_serves_cache_hits_without_enqueuing() {
    let test = build_test_app(100).await;

    let prompt = valid_prompt();
    let digest = payload_digest(&prompt);
    let artifact = write_output_png(test.tmp.path(), "cached.png");
    test.state.cache.commit(&digest, &artifact).await.unwrap();

    let response = test
        .app
        .clone()
        .oneshot(json_request("/api/v1/prompts", &prompt))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("digest").unwrap(),
        &format!("SHA-256={digest}")
    );

    assert_eq!(test.enqueues.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(test.state.executor.tasks_remaining().await, 0);
}

#[tokio::test]
async fn sync_submit_completes_and_commits_the_cache() {
    let test = build_test_app(100).await;
    write_output_png(test.tmp.path(), "result.png");
    let _runner = spawn_runner(test.queue.clone(), |_| Ok(outputs_with_image("result.png")));

    let prompt = valid_prompt();
    let digest = payload_digest(&prompt);

    let response = test
        .app
        .clone()
        .oneshot(json_request("/api/v1/prompts", &prompt))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("digest").unwrap(),
        &format!("SHA-256={digest}")
    );
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        &format!("/api/v1/images/{digest}")
    );

    // The artifact landed in the cache and is served by digest.
    assert!(test.state.cache.lookup(&digest).await.is_some());
    let image_response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/images/{digest}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(image_response.status(), StatusCode::OK);
}

#[tokio::test]
async fn identical_resubmission_hits_the_cache_with_no_second_enqueue() {
    let test = build_test_app(100).await;
    write_output_png(test.tmp.path(), "result.png");
    let _runner = spawn_runner(test.queue.clone(), |_| Ok(outputs_with_image("result.png")));

    let prompt = valid_prompt();

    let first = test
        .app
        .clone()
        .oneshot(json_request("/api/v1/prompts", &prompt))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(test.enqueues.load(std::sync::atomic::Ordering::SeqCst), 1);

    let second = test
        .app
        .clone()
        .oneshot(json_request("/api/v1/prompts", &prompt))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    // Same digest, no new work.
    assert_eq!(
        first.headers().get("digest").unwrap(),
        second.headers().get("digest").unwrap()
    );
    assert_eq!(test.enqueues.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sync_submit_surfaces_execution_failure_as_503() {
    let test = build_test_app(100).await;
    let _runner = spawn_runner(test.queue.clone(), |_| Err(failure("out of memory")));

    let response = test
        .app
        .clone()
        .oneshot(json_request("/api/v1/prompts", &valid_prompt()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("out of memory"));
}

#[tokio::test]
async fn sync_submit_without_images_returns_no_content() {
    let test = build_test_app(100).await;
    let _runner = spawn_runner(test.queue.clone(), |_| Ok(Default::default()));

    let response = test
        .app
        .clone()
        .oneshot(json_request("/api/v1/prompts", &valid_prompt()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn sync_submit_honors_uri_list_content_negotiation() {
    let test = build_test_app(100).await;
    write_output_png(test.tmp.path(), "result.png");
    let _runner = spawn_runner(test.queue.clone(), |_| Ok(outputs_with_image("result.png")));

    let prompt = valid_prompt();
    let digest = payload_digest(&prompt);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/prompts")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "text/uri-list")
        .body(Body::from(serde_json::to_vec(&prompt).unwrap()))
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/uri-list"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains(&format!("/api/v1/images/{digest}")));
    assert!(body.contains("/view?filename=result.png&type=output"));
}

#[tokio::test]
async fn concurrent_identical_submissions_converge_on_one_entry() {
    let test = build_test_app(100).await;
    write_output_png(test.tmp.path(), "result.png");
    let _runner = spawn_runner(test.queue.clone(), |_| Ok(outputs_with_image("result.png")));

    let prompt = valid_prompt();
    let app_a = test.app.clone();
    let app_b = test.app.clone();
    let req_a = json_request("/api/v1/prompts", &prompt);
    let req_b = json_request("/api/v1/prompts", &prompt);

    let (a, b) = tokio::join!(app_a.oneshot(req_a), app_b.oneshot(req_b));
    let (a, b) = (a.unwrap(), b.unwrap());

    // Both eventually succeed and reference the same artifact.
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(
        a.headers().get("digest").unwrap(),
        b.headers().get("digest").unwrap()
    );

    // Exactly one cache entry exists afterwards.
    assert_eq!(
        cache_entry_count(&test.state.config.cache_dir).await,
        1
    );
}

// ---------------------------------------------------------------------------
// Executor-state endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prompt_info_reports_queue_depth() {
    let test = build_test_app(100).await;

    let body = serde_json::json!({"prompt": valid_prompt()});
    test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/prompt").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(json["exec_info"]["queue_remaining"], 1);
}

#[tokio::test]
async fn queue_endpoint_reports_and_clears_pending_entries() {
    let test = build_test_app(100).await;

    let body = serde_json::json!({"prompt": valid_prompt()});
    test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/queue").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["queue_pending"].as_array().unwrap().len(), 1);
    assert_eq!(json["queue_running"].as_array().unwrap().len(), 0);

    let clear = test
        .app
        .clone()
        .oneshot(json_request("/queue", &serde_json::json!({"clear": true})))
        .await
        .unwrap();
    assert_eq!(clear.status(), StatusCode::OK);
    assert_eq!(test.state.executor.tasks_remaining().await, 0);
}

#[tokio::test]
async fn latest_prompt_round_trips_through_history() {
    let test = build_test_app(100).await;

    // Empty history is a 404.
    let empty = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/prompts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::NOT_FOUND);

    // Run one job to completion.
    let _runner = spawn_runner(test.queue.clone(), |_| Ok(Default::default()));
    let body = serde_json::json!({"prompt": valid_prompt()});
    test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();
    for _ in 0..100 {
        if test.state.executor.tasks_remaining().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/prompts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, valid_prompt());
}

#[tokio::test]
async fn history_endpoints_list_and_clear() {
    let test = build_test_app(100).await;
    let _runner = spawn_runner(test.queue.clone(), |_| Ok(Default::default()));

    let body = serde_json::json!({"prompt": valid_prompt()});
    test.app.clone().oneshot(json_request("/prompt", &body)).await.unwrap();
    for _ in 0..100 {
        if test.state.executor.tasks_remaining().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/history").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json.as_object().unwrap().len(), 1);

    let clear = test
        .app
        .clone()
        .oneshot(json_request("/history", &serde_json::json!({"clear": true})))
        .await
        .unwrap();
    assert_eq!(clear.status(), StatusCode::OK);

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/history").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = json_body(response).await;
    assert!(json.as_object().unwrap().is_empty());
}
