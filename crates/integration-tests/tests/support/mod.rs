#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode, header};
use axum::routing::post;
use axum::{Json, Router};
use chat_server::http::{AppState, SessionRegistry, build_router};
use serde_json::{Value, json};
use shared::SessionServices;
use shared::credentials::{CredentialResolver, CredentialSource};
use shared::llm::{GroqClientConfig, GroqClientFactory};
use shared::reference::ReferenceLoader;
use tokio::sync::{Mutex, Semaphore};
use tower::ServiceExt;
use uuid::Uuid;

pub const REFERENCE_TEXT: &str = "UniSole builds AI assistants for small businesses.";

#[derive(Clone)]
pub struct MockGroqState {
    replies: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
    pub seen_payloads: Arc<Mutex<Vec<Value>>>,
    pub requests_started: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
}

pub struct MockGroqServer {
    pub url: String,
    pub state: MockGroqState,
    handle: tokio::task::JoinHandle<()>,
}

impl MockGroqServer {
    pub async fn start(replies: Vec<(StatusCode, Value)>) -> Self {
        Self::start_with_gate(replies, None).await
    }

    /// Every completion request waits for a permit on `gate` before replying.
    pub async fn start_gated(replies: Vec<(StatusCode, Value)>, gate: Arc<Semaphore>) -> Self {
        Self::start_with_gate(replies, Some(gate)).await
    }

    async fn start_with_gate(replies: Vec<(StatusCode, Value)>, gate: Option<Arc<Semaphore>>) -> Self {
        let state = MockGroqState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_payloads: Arc::new(Mutex::new(Vec::new())),
            requests_started: Arc::new(AtomicUsize::new(0)),
            gate,
        };
        let app = Router::new()
            .route("/openai/v1/chat/completions", post(mock_chat_completions))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock groq listener should bind");
        let bind_addr = listener
            .local_addr()
            .expect("mock groq listener local address should exist");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock groq server should run");
        });

        Self {
            url: format!("http://{bind_addr}/openai/v1/chat/completions"),
            state,
            handle,
        }
    }

    pub fn requests_started(&self) -> usize {
        self.state.requests_started.load(Ordering::SeqCst)
    }

    pub async fn wait_for_requests(&self, expected: usize) {
        for _ in 0..200 {
            if self.requests_started() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("mock groq server did not receive {expected} requests");
    }
}

impl Drop for MockGroqServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn mock_chat_completions(
    State(state): State<MockGroqState>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests_started.fetch_add(1, Ordering::SeqCst);
    state.seen_payloads.lock().await.push(payload);

    if let Some(gate) = &state.gate {
        gate.acquire()
            .await
            .expect("mock gate should stay open")
            .forget();
    }

    let (status, body) = state
        .replies
        .lock()
        .await
        .pop_front()
        .unwrap_or_else(|| (StatusCode::OK, completion_body("default reply")));
    (status, Json(body))
}

pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "req-mock",
        "model": "llama3-8b-8192",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

pub fn provider_error_body(code: &str) -> Value {
    json!({ "error": { "message": "provider error", "code": code } })
}

/// Fixture files for one test; removed when the value is dropped.
#[derive(Default)]
pub struct TempFiles {
    paths: StdMutex<Vec<PathBuf>>,
}

impl TempFiles {
    pub fn write(&self, extension: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("chat-it-{}.{extension}", Uuid::new_v4()));
        std::fs::write(&path, contents).expect("temp file should write");
        self.paths
            .lock()
            .expect("temp file list lock")
            .push(path.clone());
        path
    }

    pub fn configured_credentials(&self) -> CredentialResolver {
        CredentialResolver::new(vec![CredentialSource::SecretsFile {
            path: self.write("toml", "GROQ_API_KEY = \"gsk_integration\"\n"),
            key: "GROQ_API_KEY".to_string(),
        }])
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        let paths = self
            .paths
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for path in paths.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }
}

pub fn unconfigured_credentials() -> CredentialResolver {
    CredentialResolver::new(vec![CredentialSource::SecretsFile {
        path: std::env::temp_dir().join(format!("missing-{}.toml", Uuid::new_v4())),
        key: "GROQ_API_KEY".to_string(),
    }])
}

pub fn build_test_router(
    groq_url: &str,
    credentials: CredentialResolver,
    reference_path: PathBuf,
) -> Router {
    build_router(AppState::new(test_services(
        groq_url,
        credentials,
        reference_path,
    )))
}

/// Same as [`build_test_router`] but sessions expire after `idle_ttl`.
pub fn build_test_router_with_idle_ttl(
    groq_url: &str,
    credentials: CredentialResolver,
    reference_path: PathBuf,
    idle_ttl: Duration,
) -> Router {
    build_router(AppState {
        sessions: SessionRegistry::new(idle_ttl),
        services: test_services(groq_url, credentials, reference_path),
    })
}

fn test_services(
    groq_url: &str,
    credentials: CredentialResolver,
    reference_path: PathBuf,
) -> SessionServices {
    let factory = GroqClientFactory::new(GroqClientConfig {
        chat_completions_url: groq_url.to_string(),
        model: "llama3-8b-8192".to_string(),
        timeout_ms: 5_000,
        max_retries: 0,
        retry_base_backoff_ms: 0,
        temperature: 0.7,
    })
    .expect("groq client factory should build");

    SessionServices {
        credentials,
        reference: ReferenceLoader::new(reference_path),
        client_factory: Arc::new(factory),
    }
}

pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body should be json")
    };

    (status, value)
}

pub async fn create_session(app: &Router) -> String {
    let (status, body) = send_json(app, Method::POST, "/v1/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"]
        .as_str()
        .expect("session id should be present")
        .to_string()
}

/// Polls the session snapshot until it reports `state`.
pub async fn wait_for_state(app: &Router, session_id: &str, state: &str) -> Value {
    let uri = format!("/v1/sessions/{session_id}");
    for _ in 0..200 {
        let (status, body) = send_json(app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        if body["state"] == state {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never reached state {state}");
}
