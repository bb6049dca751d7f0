#![allow(dead_code)]

use async_trait::async_trait;
use comfyui_client::transport::RequestBody;
use comfyui_client::{ApiRequest, ApiResponse, AsyncTransport, ComfyError, Transport};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory stand-in for a ComfyUI server.
///
/// Answers `/prompt`, `/history/{id}` and `/view` from its script, serves
/// fixed responses for any other registered path, and records every request.
#[derive(Debug, Default)]
pub struct FakeServer {
    prompt_id: Option<String>,
    empty_polls: usize,
    outputs: Option<Value>,
    files: HashMap<String, Vec<u8>>,
    routes: HashMap<String, ApiResponse>,
    unreachable: bool,
    requests: Mutex<Vec<ApiRequest>>,
    history_polls: AtomicUsize,
    closes: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept submissions and hand out this prompt id.
    pub fn accepting(mut self, prompt_id: &str) -> Self {
        self.prompt_id = Some(prompt_id.to_string());
        self
    }

    /// History lacks the prompt for `empty_polls` polls, then holds `outputs`.
    pub fn completes_after(mut self, empty_polls: usize, outputs: Value) -> Self {
        self.empty_polls = empty_polls;
        self.outputs = Some(outputs);
        self
    }

    pub fn file(mut self, filename: &str, bytes: &[u8]) -> Self {
        self.files.insert(filename.to_string(), bytes.to_vec());
        self
    }

    pub fn route(mut self, path: &str, response: ApiResponse) -> Self {
        self.routes.insert(path.to_string(), response);
        self
    }

    /// Fail every request as if the connection were refused.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .count()
    }

    pub fn downloads(&self) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == "/view")
            .collect()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn respond(&self, request: &ApiRequest) -> Result<ApiResponse, ComfyError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.unreachable {
            return Err(ComfyError::Transport("connection refused".into()));
        }
        if let Some(resp) = self.routes.get(&request.path) {
            return Ok(resp.clone());
        }

        let path = request.path.as_str();
        if path == "/prompt" {
            return Ok(match &self.prompt_id {
                Some(id) => ApiResponse::json(&json!({
                    "prompt_id": id,
                    "number": 0,
                    "node_errors": {}
                })),
                None => ApiResponse::new(500, "prompt rejected"),
            });
        }
        if path == "/view" {
            let name = request.query_value("filename").unwrap_or_default();
            return Ok(match self.files.get(name) {
                Some(bytes) => ApiResponse::new(200, bytes.clone()),
                None => ApiResponse::new(404, "file not found"),
            });
        }
        if let Some(id) = path.strip_prefix("/history/") {
            let poll = self.history_polls.fetch_add(1, Ordering::SeqCst);
            let known = self.prompt_id.as_deref() == Some(id);
            return Ok(match &self.outputs {
                Some(outputs) if known && poll >= self.empty_polls => {
                    ApiResponse::json(&json!({ id: { "outputs": outputs } }))
                }
                _ => ApiResponse::json(&json!({})),
            });
        }
        Ok(ApiResponse::new(404, "no route"))
    }
}

impl Transport for FakeServer {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ComfyError> {
        self.respond(request)
    }
}

#[async_trait]
impl AsyncTransport for FakeServer {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ComfyError> {
        self.respond(request)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Outputs of a single SaveImage node writing `out.png`.
pub fn single_image_outputs() -> Value {
    json!({
        "9": {
            "images": [
                {"filename": "out.png", "subfolder": "", "type": "output"}
            ]
        }
    })
}

pub fn sample_workflow() -> Value {
    json!({
        "4": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": {"ckpt_name": "v1-5-pruned-emaonly.ckpt"}
        },
        "9": {
            "class_type": "SaveImage",
            "inputs": {"filename_prefix": "ComfyUI", "images": ["8", 0]}
        }
    })
}

pub fn multipart_fields(request: &ApiRequest) -> Option<(String, Vec<(String, String)>)> {
    match &request.body {
        RequestBody::Multipart { file, fields } => Some((file.file_name.clone(), fields.clone())),
        _ => None,
    }
}
