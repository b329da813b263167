#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use llmanager::config::Provider;
use llmanager::error::LLMError;
use llmanager::http::{
    HttpBodyStream, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport,
};
use llmanager::session::SessionEnv;
use serde_json::Value;

pub const MOCK_BASE: &str = "http://mock.local";

enum Canned {
    Body { status: u16, body: String },
    Chunks { status: u16, chunks: Vec<String> },
}

/// Request captured by [`MockTransport`], with the JSON body decoded.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

/// In-memory transport replaying canned responses in order.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Canned>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push_text(status, body.to_string());
    }

    pub fn push_text(&self, status: u16, body: impl Into<String>) {
        self.responses.lock().expect("lock").push_back(Canned::Body {
            status,
            body: body.into(),
        });
    }

    /// Queues a streaming body delivered as the given network chunks.
    pub fn push_chunks<I, S>(&self, status: u16, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses.lock().expect("lock").push_back(Canned::Chunks {
            status,
            chunks: chunks.into_iter().map(Into::into).collect(),
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("lock").len()
    }

    fn record(&self, request: HttpRequest) -> Canned {
        let body = request
            .body
            .as_deref()
            .map(|bytes| serde_json::from_slice(bytes).expect("request bodies are JSON"));
        self.requests.lock().expect("lock").push(Recorded {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body,
        });
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .expect("no canned response left")
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        let (status, body) = match self.record(request) {
            Canned::Body { status, body } => (status, body),
            Canned::Chunks { status, chunks } => (status, chunks.concat()),
        };
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.into_bytes(),
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
        let (status, chunks) = match self.record(request) {
            Canned::Body { status, body } => (status, vec![body]),
            Canned::Chunks { status, chunks } => (status, chunks),
        };
        let body: HttpBodyStream = Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, LLMError>(chunk.into_bytes())),
        ));
        Ok(HttpStreamResponse {
            status,
            headers: HashMap::new(),
            body,
        })
    }
}

/// Session environment routed to `mock`, with every provider at [`MOCK_BASE`].
pub fn mock_env(mock: &Arc<MockTransport>, secrets: &[(&str, &str)]) -> SessionEnv {
    let secrets: HashMap<String, String> = secrets
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    let mut env = SessionEnv::new(mock.clone(), Arc::new(secrets));
    for provider in Provider::ALL {
        env = env.with_base_url(provider, MOCK_BASE);
    }
    env
}

/// Encodes JSON payloads as server-sent events.
pub fn sse(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect()
}
