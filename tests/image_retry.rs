use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use freegate::config::{AppConfig, ProvidersConfig, RetryConfig, RetrySettings};
use freegate::routing::dispatch_request;
use freegate::state::AppState;
use serde_json::{json, Value};

fn fast_retry(max_attempts: u32) -> RetrySettings {
    RetrySettings {
        max_attempts,
        base_delay_ms: 5,
        timeout_secs: 5,
    }
}

fn build_state(base_url: &str) -> Arc<AppState> {
    let config = AppConfig {
        providers: ProvidersConfig::all_at(base_url),
        retry: RetryConfig {
            edit: fast_retry(3),
            remove_background: fast_retry(3),
            style_conversion: fast_retry(2),
        },
        ..AppConfig::default()
    };
    Arc::new(AppState::from_config(config))
}

async fn spawn_mock(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), server)
}

async fn post_json(state: Arc<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// A mock that answers 503 for the first `failures` calls and then succeeds.
fn flaky_removebg(failures: usize, calls: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/api/removebg.php",
        post(move |body: String| {
            let calls = Arc::clone(&calls);
            async move {
                let request: Value = serde_json::from_str(&body).unwrap();
                assert_eq!(request["imageUrl"], "https://img.test/cat.png");
                let call = calls.fetch_add(1, Ordering::SeqCst);
                if call < failures {
                    (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})))
                } else {
                    (
                        StatusCode::OK,
                        Json(json!({"url": "https://cdn.test/cat-nobg.png"})),
                    )
                }
            }
        }),
    )
}

#[tokio::test]
async fn test_remove_background_exhausts_retries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (base_url, server) = spawn_mock(flaky_removebg(usize::MAX, Arc::clone(&calls))).await;
    let state = build_state(&base_url);

    let (status, body) = post_json(
        state,
        "/v1/images/remove-background",
        json!({"image_url": "https://img.test/cat.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(body["error"]["type"], "api_error");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Remove BG API error:"), "{message}");
    assert!(message.contains("failed after 3 attempts"), "{message}");

    server.abort();
}

#[tokio::test]
async fn test_remove_background_recovers_after_transient_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (base_url, server) = spawn_mock(flaky_removebg(1, Arc::clone(&calls))).await;
    let state = build_state(&base_url);

    let (status, body) = post_json(
        state,
        "/v1/images/remove-background",
        json!({"image_url": "https://img.test/cat.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://cdn.test/cat-nobg.png");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    server.abort();
}

#[tokio::test]
async fn test_edit_does_not_retry_client_errors() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let app = Router::new().route(
        "/api/nano_banana.php",
        post(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::BAD_REQUEST, "bad image")
            }
        }),
    );
    let (base_url, server) = spawn_mock(app).await;
    let state = build_state(&base_url);

    let (status, body) = post_json(
        state,
        "/v1/images/edits",
        json!({"prompt": "add a hat", "image_url": "https://img.test/cat.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Nano Banana API error:"));

    server.abort();
}

#[tokio::test]
async fn test_edit_returns_image_url() {
    let app = Router::new().route(
        "/api/nano_banana.php",
        post(|body: String| async move {
            let request: Value = serde_json::from_str(&body).unwrap();
            assert_eq!(request["prompt"], "add a hat");
            Json(json!({"image": "https://cdn.test/hat.png"}))
        }),
    );
    let (base_url, server) = spawn_mock(app).await;
    let state = build_state(&base_url);

    let (status, body) = post_json(
        state,
        "/v1/images/edits",
        json!({"prompt": "add a hat", "image_url": "https://img.test/cat.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://cdn.test/hat.png");

    server.abort();
}

#[tokio::test]
async fn test_style_conversion_inlines_binary_image() {
    let app = Router::new().route(
        "/api/anime.php",
        get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![1u8, 2, 3]) }),
    );
    let (base_url, server) = spawn_mock(app).await;
    let state = build_state(&base_url);

    let (status, body) = post_json(
        state,
        "/v1/images/anime",
        json!({"image_url": "https://img.test/cat.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["b64_json"], "AQID");
    assert_eq!(body["mime_type"], "image/png");

    server.abort();
}

#[tokio::test]
async fn test_image_request_requires_image_url() {
    let state = build_state("http://127.0.0.1:9");

    let (status, body) = post_json(
        state,
        "/v1/images/remove-background",
        json!({"image_url": "  "}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}
