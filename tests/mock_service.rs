#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wavespeed_rs::{ClientConfig, ClientConfigBuilder, WaveSpeed};

/// One scripted response, served in FIFO order.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
    pub delay: Duration,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as the mock service saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

/// In-process stand-in for the prediction API, mounted under `/api/v3`.
pub struct MockService {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockService {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api/v3", addr),
            state,
        }
    }

    pub fn push(&self, reply: Reply) {
        self.state.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_many(&self, reply: Reply, count: usize) {
        for _ in 0..count {
            self.push(reply.clone());
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// Builder pointed at this service with fast polling and backoff.
    pub fn config(&self) -> ClientConfigBuilder {
        ClientConfig::builder()
            .with_api_key("test-key")
            .with_base_url(self.base_url.clone())
            .with_poll_interval(Duration::from_millis(10))
            .with_backoff_base(Duration::from_millis(1))
            .without_env()
    }

    pub fn client(&self) -> WaveSpeed {
        WaveSpeed::new(self.config().build().unwrap()).unwrap()
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(Recorded {
        method,
        path_and_query: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default(),
        headers,
        body: body.to_vec(),
    });

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(reply) => {
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            let status = StatusCode::from_u16(reply.status).unwrap();
            (status, Json(reply.body)).into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no scripted reply").into_response(),
    }
}

/// Success envelope around a prediction payload.
pub fn prediction_envelope(id: &str, status: &str) -> Value {
    let completed = status == "completed";
    let outputs: Vec<String> = if completed {
        vec![format!("https://cdn.example.com/{}.png", id)]
    } else {
        vec![]
    };
    let nsfw: Vec<bool> = if completed { vec![false] } else { vec![] };
    let error = if status == "failed" { "model crashed" } else { "" };
    json!({
        "code": 200,
        "message": "success",
        "data": {
            "id": id,
            "model": "model-x",
            "status": status,
            "input": {"prompt": "a"},
            "outputs": outputs,
            "urls": {"get": format!("https://api.wavespeed.ai/api/v3/predictions/{}/result", id)},
            "has_nsfw_contents": nsfw,
            "created_at": "2024-05-01T12:00:00.000Z",
            "error": error,
        }
    })
}
