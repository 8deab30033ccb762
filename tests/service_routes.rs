use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use freegate::config::{AppConfig, ProvidersConfig, ServerConfig};
use freegate::routing::dispatch_request;
use freegate::state::AppState;
use serde_json::{json, Value};

fn build_state(base_url: &str, base_path: &str) -> Arc<AppState> {
    let config = AppConfig {
        server: ServerConfig {
            timeout: 2,
            base_path: base_path.to_string(),
            ..ServerConfig::default()
        },
        providers: ProvidersConfig::all_at(base_url),
        ..AppConfig::default()
    };
    Arc::new(AppState::from_config(config))
}

async fn get_json(state: Arc<AppState>, base_path: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = dispatch_request(state, Arc::<str>::from(base_path), request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_models_listing() {
    let state = build_state("http://127.0.0.1:9", "");

    let (status, body) = get_json(state, "", "/v1/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "list");

    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|card| card["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"gemma-27b"));
    assert!(ids.contains(&"deepseek-chat"));
    assert!(ids.contains(&"cf-meta-llama-3-8b-instruct"));
    assert!(ids.iter().all(|id| !id.contains('@') && !id.contains('/')));

    let card = &body["data"][0];
    assert_eq!(card["object"], "model");
    assert!(card["owned_by"].is_string());
}

#[tokio::test]
async fn test_health_reports_config_summary() {
    let state = build_state("http://127.0.0.1:9", "");

    let (status, body) = get_json(Arc::clone(&state), "", "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "freegate is running");
    assert_eq!(body["config"]["models_count"], state.registry.len());
    assert_eq!(body["config"]["streaming"]["granularity"], "word");
    assert_eq!(body["config"]["models"]["unknown_model"], "fallback");
}

#[tokio::test]
async fn test_base_path_and_unknown_routes() {
    let state = build_state("http://127.0.0.1:9", "/gw");

    let (status, _) = get_json(Arc::clone(&state), "/gw", "/gw/v1/models").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json(Arc::clone(&state), "/gw", "/v1/models").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(state, "/gw", "/gw/v1/chat/completions").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let state = build_state("http://127.0.0.1:9", "");
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .body(Body::from(vec![b'x'; 3 * 1024 * 1024]))
        .unwrap();

    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_provider_status_probes_every_provider() {
    let app = Router::new().route(
        "/api/gemma.php",
        post(|| async { Json(json!({"response": "hello"})) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let state = build_state(&format!("http://{addr}"), "");

    let (status, body) = get_json(state, "", "/v1/providers/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "list");

    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 10);

    let gemma = entries
        .iter()
        .find(|entry| entry["provider"] == "gemma")
        .unwrap();
    assert_eq!(gemma["status"], "up");
    assert!(gemma.get("error").is_none());

    let qwen = entries
        .iter()
        .find(|entry| entry["provider"] == "qwen")
        .unwrap();
    assert_ne!(qwen["status"], "up");
    assert!(qwen["error"].as_str().unwrap().starts_with("Qwen API error:"));

    server.abort();
}
