#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use fortune_service::config::{FortuneConfig, LotsConfig, OllamaConfig, StaticConfig};
use fortune_service::models::FortuneLot;
use fortune_service::services::providers::ChatProvider;
use fortune_service::startup::{build_router, AppState, Application};
use http_body_util::BodyExt;
use service_core::config::Config as CoreConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_MODEL: &str = "qwen2.5:7b";

pub fn manifest_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

pub fn lots_fixture() -> Vec<FortuneLot> {
    let raw = std::fs::read(manifest_path("data/lots.json")).expect("Failed to read lots fixture");
    serde_json::from_slice(&raw).expect("Failed to parse lots fixture")
}

pub fn test_config(ollama_url: &str, timeout_secs: u64) -> FortuneConfig {
    FortuneConfig {
        common: CoreConfig { port: 0 },
        ollama: OllamaConfig {
            base_url: ollama_url.trim_end_matches('/').to_string(),
            model: TEST_MODEL.to_string(),
            timeout_secs,
        },
        lots: LotsConfig {
            path: manifest_path("data/lots.json"),
        },
        static_files: StaticConfig {
            dir: manifest_path("static"),
        },
    }
}

/// Router backed by the given provider.
pub fn app_with_provider(provider: Arc<dyn ChatProvider>) -> Router {
    build_router(AppState::new(test_config("http://127.0.0.1:11434", 5), provider))
}

/// Router backed by the real Ollama client pointed at `ollama_url`.
pub fn app_with_ollama(ollama_url: &str, timeout_secs: u64) -> Router {
    let config = test_config(ollama_url, timeout_secs);
    let provider = Arc::new(
        fortune_service::services::providers::ollama::OllamaProvider::new(config.ollama.clone()),
    );
    build_router(AppState::new(config, provider))
}

/// Serve `router` on a random local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("Failed to bind fake server");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Base URL of a port nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("Failed to bind probe listener");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).expect("Response body is not JSON")
}

/// Parse a `text/event-stream` body into its JSON `data:` payloads.
pub fn sse_events(body: &str) -> Vec<serde_json::Value> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            let data = frame
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("Unexpected SSE frame: {:?}", frame));
            serde_json::from_str(data).expect("SSE data is not JSON")
        })
        .collect()
}

pub fn chat_body(message: &str, history: serde_json::Value) -> serde_json::Value {
    let lot = &lots_fixture()[0];
    serde_json::json!({
        "message": message,
        "history": history,
        "lot": lot,
    })
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
}

impl TestApp {
    pub async fn spawn(ollama_url: &str) -> Self {
        let app = Application::build(test_config(ollama_url, 5))
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp { address, port }
    }
}
