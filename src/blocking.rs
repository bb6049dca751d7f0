//! Blocking client.
//!
//! Same operations and failure contract as the async [`ComfyClient`](crate::ComfyClient),
//! executed on the caller's thread. Waiting between polls blocks the thread.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::config::ClientConfig;
use crate::error::{ComfyError, Result};
use crate::protocol::{self, or_log};
use crate::transport::{ApiRequest, ApiResponse, BlockingHttpTransport, Transport};
use crate::types::{ArtifactRef, JsonMap, PollOptions, QueueStatus, UploadKind};

/// Blocking client for a ComfyUI server instance.
///
/// Must not be used from inside an async runtime; use the async client there.
///
/// # Example
/// ```no_run
/// use comfyui_client::blocking::ComfyClient;
///
/// let client = ComfyClient::new("http://127.0.0.1:8188");
/// let queue = client.queue_status();
/// println!("{} running, {} pending", queue.running, queue.pending);
/// ```
#[derive(Debug)]
pub struct ComfyClient<T = BlockingHttpTransport> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
}

impl<T> Clone for ComfyClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
        }
    }
}

impl ComfyClient<BlockingHttpTransport> {
    /// Create a client for a URL or bare `host:port`.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self::with_config(ClientConfig::new(url))
    }

    /// Create a client from the legacy `host:port` + https flag pair.
    pub fn from_legacy_address(server_address: impl Into<String>, https: bool) -> Self {
        Self::with_config(
            ClientConfig::builder()
                .legacy_address(server_address, https)
                .build(),
        )
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let transport = BlockingHttpTransport::new(&config);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> ComfyClient<T> {
    /// Create a client that sends requests through `transport`.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(method = ?request.method, path = %request.path, "sending request");
        self.transport.execute(&request)
    }

    // ── Uploads ─────────────────────────────────────────────────────

    /// Upload a local file. Returns the name the server stored it under.
    pub fn upload(&self, path: impl AsRef<Path>, kind: UploadKind, overwrite: bool) -> Option<String> {
        or_log(self.try_upload(path.as_ref(), kind, overwrite), "upload")
    }

    /// Upload an input image, overwriting any existing file of that name.
    pub fn upload_image(&self, path: impl AsRef<Path>) -> Option<String> {
        self.upload(path, UploadKind::Image, true)
    }

    /// Upload a mask, overwriting any existing file of that name.
    pub fn upload_mask(&self, path: impl AsRef<Path>) -> Option<String> {
        self.upload(path, UploadKind::Mask, true)
    }

    fn try_upload(&self, path: &Path, kind: UploadKind, overwrite: bool) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| ComfyError::Io {
            context: format!("Failed to read {}", path.display()),
            source: e,
        })?;
        let request =
            protocol::upload_request(kind, protocol::upload_file_name(path), bytes, overwrite);
        protocol::parse_upload(self.send(request)?)
    }

    // ── Control ─────────────────────────────────────────────────────

    /// Ask the server to stop the running prompt. `true` means the request
    /// was accepted, not that execution has stopped.
    pub fn interrupt(&self) -> bool {
        match self.send(protocol::interrupt_request()) {
            Ok(resp) if resp.is_ok() => true,
            Ok(resp) => {
                warn!(status = resp.status, "interrupt rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "interrupt failed");
                false
            }
        }
    }

    // ── Discovery ───────────────────────────────────────────────────

    /// Input/output schema of one node class.
    pub fn object_info(&self, node_class: &str) -> Option<JsonMap> {
        let result = self
            .send(protocol::object_info_request(node_class))
            .and_then(protocol::json_object);
        or_log(result, "object info")
    }

    /// Enumerated choices for a required input of a node class.
    pub fn input_choices(&self, node_class: &str, input: &str) -> Vec<String> {
        self.object_info(node_class)
            .map(|info| protocol::input_choices(&info, node_class, input))
            .unwrap_or_default()
    }

    /// List available checkpoint models.
    pub fn checkpoints(&self) -> Vec<String> {
        self.input_choices("CheckpointLoaderSimple", "ckpt_name")
    }

    /// List available sampler algorithms.
    pub fn samplers(&self) -> Vec<String> {
        self.input_choices("KSampler", "sampler_name")
    }

    /// List available scheduler algorithms.
    pub fn schedulers(&self) -> Vec<String> {
        self.input_choices("KSampler", "scheduler")
    }

    // ── Queue / history ─────────────────────────────────────────────

    /// Raw `/queue` response, empty on failure.
    pub fn queue_state(&self) -> JsonMap {
        self.fetch_map(protocol::queue_request(), "queue")
    }

    /// Running and pending prompt counts.
    pub fn queue_status(&self) -> QueueStatus {
        protocol::queue_status(&self.queue_state())
    }

    /// Full history, or the entry for one prompt. Empty on failure.
    pub fn history(&self, prompt_id: Option<&str>) -> JsonMap {
        self.fetch_map(protocol::history_request(prompt_id), "history")
    }

    fn fetch_map(&self, request: ApiRequest, operation: &str) -> JsonMap {
        let result = self.send(request).and_then(protocol::json_object);
        or_log(result, operation).unwrap_or_default()
    }

    // ── Files ───────────────────────────────────────────────────────

    /// Download a stored file by its three-part address.
    pub fn view(&self, filename: &str, subfolder: &str, folder_type: &str) -> Option<Vec<u8>> {
        let result = self
            .send(protocol::view_request(filename, subfolder, folder_type))
            .and_then(protocol::ensure_ok)
            .map(|r| r.body);
        or_log(result, "download")
    }

    /// Download the file a descriptor points at.
    pub fn download(&self, file: &ArtifactRef) -> Option<Vec<u8>> {
        self.view(&file.filename, &file.subfolder, &file.folder_type)
    }

    // ── Prompt lifecycle ────────────────────────────────────────────

    /// Queue a workflow for execution. Returns the `prompt_id`.
    pub fn submit(&self, workflow: &Value) -> Option<String> {
        let request = protocol::submit_request(workflow, self.config.client_id.as_deref());
        let result = self.send(request).and_then(protocol::parse_submit);
        let prompt_id = or_log(result, "submit")?;
        info!(prompt_id = %prompt_id, "prompt queued");
        Some(prompt_id)
    }

    /// Poll history until the prompt appears. Never times out.
    pub fn await_completion(&self, prompt_id: &str, interval: Duration) -> JsonMap {
        self.await_completion_with(prompt_id, &PollOptions::new(interval))
            .unwrap_or_default()
    }

    /// Poll history until the prompt appears, the deadline passes, or the
    /// cancellation flag is raised. Sleeps the calling thread between polls.
    pub fn await_completion_with(&self, prompt_id: &str, options: &PollOptions) -> Result<JsonMap> {
        let start = Instant::now();
        let mut polls: u64 = 0;
        loop {
            if options.is_cancelled() {
                return Err(ComfyError::Cancelled(prompt_id.to_string()));
            }
            if options.is_expired(start.elapsed()) {
                return Err(ComfyError::Timeout(prompt_id.to_string()));
            }

            polls += 1;
            let history = self.history(Some(prompt_id));
            if let Some(outputs) = protocol::completed_outputs(&history, prompt_id) {
                info!(prompt_id = %prompt_id, polls, "prompt completed");
                return Ok(outputs);
            }
            debug!(prompt_id = %prompt_id, polls, "prompt not in history yet");
            std::thread::sleep(options.interval);
        }
    }

    /// Download every file listed in a prompt's outputs.
    ///
    /// Failed or empty downloads are skipped.
    pub fn collect_artifacts(&self, outputs: &JsonMap) -> Vec<Artifact> {
        protocol::extract_artifact_refs(outputs)
            .into_iter()
            .filter_map(|file| match self.download(&file) {
                Some(bytes) if !bytes.is_empty() => Some(Artifact::from_ref(bytes, &file)),
                _ => {
                    debug!(filename = %file.filename, "skipping artifact with no data");
                    None
                }
            })
            .collect()
    }

    /// Submit a workflow, wait for it, and download everything it produced.
    pub fn run_to_artifacts(&self, workflow: &Value) -> Vec<Artifact> {
        let options = PollOptions::new(self.config.poll_interval);
        self.run_to_artifacts_with(workflow, &options)
    }

    /// Like [`run_to_artifacts`](Self::run_to_artifacts) with a bounded wait.
    pub fn run_to_artifacts_with(&self, workflow: &Value, options: &PollOptions) -> Vec<Artifact> {
        let Some(prompt_id) = self.submit(workflow) else {
            return Vec::new();
        };
        match self.await_completion_with(&prompt_id, options) {
            Ok(outputs) => self.collect_artifacts(&outputs),
            Err(e) => {
                warn!(error = %e, "gave up waiting for prompt");
                Vec::new()
            }
        }
    }
}
