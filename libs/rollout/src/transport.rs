//! HTTP transport seam for the platform client.
//!
//! The client never talks to `reqwest` directly. It builds a
//! [`PlatformRequest`] and hands it to a [`Transport`]:
//! - [`HttpTransport`] sends it over the network
//! - [`MockTransport`] replays scripted responses and records what was sent

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::PlatformSettings;
use crate::error::PlatformError;

/// A single request against the platform management API.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl PlatformRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a query parameter by name.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a platform response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformResponse {
    pub status: u16,
    pub body: String,
}

impl PlatformResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON, attributing failures to `path`.
    pub fn json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        serde_json::from_str(&self.body).map_err(|e| PlatformError::decode(path, e))
    }
}

/// One request/response exchange with the platform.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PlatformRequest) -> Result<PlatformResponse, PlatformError>;
}

/// Network transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport that authenticates every request with the settings' token.
    pub fn new(settings: &PlatformSettings) -> Result<Self, PlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("bearer {}", settings.token))
                .map_err(|e| PlatformError::Transport(format!("invalid token format: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: PlatformRequest) -> Result<PlatformResponse, PlatformError> {
        let url = self.url(&request.path);
        debug!(method = %request.method, url = %url, "sending platform request");

        let mut builder = self.client.request(request.method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(status, "platform responded");
        Ok(PlatformResponse { status, body })
    }
}

type Scripted = Result<PlatformResponse, String>;

#[derive(Default)]
struct MockState {
    routes: HashMap<(Method, String), VecDeque<Scripted>>,
    requests: Vec<PlatformRequest>,
}

/// Scripted transport for tests and dry runs.
///
/// Responses are queued per method and path. The last queued response for a
/// route keeps being replayed once the queue is drained. Unscripted routes
/// answer 404.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method path`.
    pub fn respond(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.push(method, path, Ok(PlatformResponse::new(status, body)));
        self
    }

    /// Drop anything scripted for `method path` and answer with this instead.
    pub fn replace(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.lock().routes.remove(&(method.clone(), path.to_string()));
        self.respond(method, path, status, body)
    }

    /// Queue a transport-level failure for `method path`.
    pub fn fail(self, method: Method, path: &str) -> Self {
        self.push(method, path, Err("connection refused".to_string()));
        self
    }

    fn push(&self, method: Method, path: &str, response: Scripted) {
        let mut state = self.lock();
        state
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Lock the shared state. A poisoned lock still holds usable state.
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<PlatformRequest> {
        self.lock().requests.clone()
    }

    /// Requests sent to `method path`, in order.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<PlatformRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: PlatformRequest) -> Result<PlatformResponse, PlatformError> {
        let mut state = self.lock();
        let key = (request.method.clone(), request.path.clone());
        state.requests.push(request);

        let scripted = match state.routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(PlatformError::Transport(message)),
            None => Ok(PlatformResponse::new(404, "no scripted response")),
        }
    }
}
