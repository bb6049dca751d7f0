//! HTTP transports.
//!
//! A transport executes one [`ApiRequest`] against the server and returns the
//! raw status and body. Everything above it (request shapes, response
//! interpretation, polling) is shared by the blocking and async clients, so
//! swapping the transport is the only difference between the two.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ComfyError, Result};

/// HTTP method of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A file attached to a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Body of an [`ApiRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart {
        file: FilePart,
        fields: Vec<(String, String)>,
    },
}

/// A transport-agnostic description of one request to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, file: FilePart, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Multipart { file, fields };
        self
    }

    /// Look up a query parameter by key.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response carrying `value` serialized as JSON.
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// ComfyUI signals success with exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn parse_json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Executes requests on the caller's thread.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Executes requests without blocking the calling task.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;

    /// Release any pooled connection state. Must be safe to call repeatedly
    /// and must not block, since it also runs when a scoped use is dropped.
    fn close(&self) {}
}

fn request_url(base_url: &str, request: &ApiRequest) -> String {
    format!("{}{}", base_url, request.path)
}

fn network_error(url: &str, source: reqwest::Error) -> ComfyError {
    ComfyError::Network {
        context: format!("Request to {} failed", url),
        source,
    }
}

// ── Async ───────────────────────────────────────────────────────────

/// Async transport backed by `reqwest::Client`.
///
/// The client (the "session") is created on first use and kept for reuse.
/// [`close`](AsyncTransport::close) drops it; the next request opens a new one.
/// The session lock is never held across an `.await`, so closing is
/// synchronous and can run from `Drop`.
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    template: Option<reqwest::Client>,
    session: Mutex<Option<reqwest::Client>>,
    opened: AtomicUsize,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: config.request_timeout,
            template: None,
            session: Mutex::new(None),
            opened: AtomicUsize::new(0),
        }
    }

    /// Use a custom `reqwest::Client` (for TLS, proxies or default headers)
    /// whenever a session is opened.
    ///
    /// Every session is a clone of `client` and `reqwest` clones share one
    /// connection pool, so [`close`](AsyncTransport::close) only drops this
    /// transport's handle. Pooled connections are released once the caller's
    /// copy is dropped as well.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.template = Some(client);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a session is currently open.
    pub fn is_open(&self) -> bool {
        self.lock_session().is_some()
    }

    /// Number of sessions opened over this transport's lifetime.
    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<reqwest::Client>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> Result<reqwest::Client> {
        let mut guard = self.lock_session();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = match &self.template {
            Some(client) => client.clone(),
            None => reqwest::Client::builder()
                .build()
                .map_err(|e| network_error(&self.base_url, e))?,
        };
        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!(base_url = %self.base_url, "opened ComfyUI session");
        *guard = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl AsyncTransport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let client = self.session()?;
        let url = request_url(&self.base_url, request);

        let mut builder = match request.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
        };
        builder = builder.timeout(self.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart { file, fields } => {
                let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone());
                let form = fields
                    .iter()
                    .fold(
                        reqwest::multipart::Form::new().part(file.field.clone(), part),
                        |form, (k, v)| form.text(k.clone(), v.clone()),
                    );
                builder.multipart(form)
            }
        };

        let resp = builder.send().await.map_err(|e| network_error(&url, e))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| network_error(&url, e))?;
        Ok(ApiResponse::new(status, body.to_vec()))
    }

    fn close(&self) {
        if self.lock_session().take().is_some() {
            debug!(base_url = %self.base_url, "closed ComfyUI session");
        }
    }
}

// ── Blocking ────────────────────────────────────────────────────────

/// Blocking transport backed by `reqwest::blocking::Client`.
///
/// Must not be driven from inside an async runtime.
#[derive(Debug)]
pub struct BlockingHttpTransport {
    base_url: String,
    timeout: Duration,
    client: Mutex<Option<reqwest::blocking::Client>>,
}

impl BlockingHttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout: config.request_timeout,
            client: Mutex::new(None),
        }
    }

    /// Use a custom `reqwest::blocking::Client`.
    pub fn with_http_client(self, client: reqwest::blocking::Client) -> Self {
        Self {
            client: Mutex::new(Some(client)),
            ..self
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> Result<reqwest::blocking::Client> {
        let mut guard = self
            .client
            .lock()
            .map_err(|e| ComfyError::Transport(format!("HTTP client lock poisoned: {}", e)))?;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| network_error(&self.base_url, e))?;
        *guard = Some(client.clone());
        Ok(client)
    }
}

impl Transport for BlockingHttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let client = self.client()?;
        let url = request_url(&self.base_url, request);

        let mut builder = match request.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
        };
        builder = builder.timeout(self.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart { file, fields } => {
                let part = reqwest::blocking::multipart::Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone());
                let form = fields.iter().fold(
                    reqwest::blocking::multipart::Form::new().part(file.field.clone(), part),
                    |form, (k, v)| form.text(k.clone(), v.clone()),
                );
                builder.multipart(form)
            }
        };

        let resp = builder.send().map_err(|e| network_error(&url, e))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| network_error(&url, e))?;
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}
