use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::config::ClientConfig;
use crate::error::{ComfyError, Result};
use crate::protocol::{self, or_log};
use crate::transport::{ApiRequest, ApiResponse, AsyncTransport, HttpTransport};
use crate::types::{ArtifactRef, JsonMap, PollOptions, QueueStatus, UploadKind};

/// Async client for a ComfyUI server instance.
///
/// Every operation makes its own round trip and never returns an error:
/// failures are logged and reported as `None`, `false` or an empty value.
/// The underlying session is opened on first use and can be released with
/// [`close`](Self::close) or [`scoped`](Self::scoped).
///
/// # Example
/// ```no_run
/// use comfyui_client::ComfyClient;
/// use serde_json::json;
///
/// # async fn example() {
/// let client = ComfyClient::new("127.0.0.1:8188");
/// let workflow = json!({ /* node graph */ });
/// for artifact in client.run_to_artifacts(&workflow).await {
///     artifact.save().unwrap();
/// }
/// client.close().await;
/// # }
/// ```
#[derive(Debug)]
pub struct ComfyClient<T = HttpTransport> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
}

/// Closes the transport's session when dropped.
struct CloseOnDrop<'a, T: AsyncTransport>(&'a T);

impl<T: AsyncTransport> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl<T> Clone for ComfyClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
        }
    }
}

impl ComfyClient<HttpTransport> {
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
        let transport = HttpTransport::new(&config);
        Self::with_transport(config, transport)
    }

    /// Whether the HTTP session is currently open.
    pub fn is_session_open(&self) -> bool {
        self.transport.is_open()
    }
}

impl<T: AsyncTransport> ComfyClient<T> {
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

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(method = ?request.method, path = %request.path, "sending request");
        self.transport.execute(&request).await
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Release the HTTP session. Safe to call repeatedly or before first use.
    pub async fn close(&self) {
        self.transport.close();
    }

    /// Run `f` with this client, then close the session.
    ///
    /// The session is released however the scope ends: normal return,
    /// a panic in `f`, or the returned future being dropped early (for
    /// example by `tokio::time::timeout` or `select!`).
    pub async fn scoped<F, Fut, R>(&self, f: F) -> R
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = R>,
    {
        let _release = CloseOnDrop(self.transport.as_ref());
        f(self.clone()).await
    }

    // ── Uploads ─────────────────────────────────────────────────────

    /// Upload a local file. Returns the name the server stored it under.
    pub async fn upload(
        &self,
        path: impl AsRef<Path>,
        kind: UploadKind,
        overwrite: bool,
    ) -> Option<String> {
        or_log(self.try_upload(path.as_ref(), kind, overwrite).await, "upload")
    }

    /// Upload an input image, overwriting any existing file of that name.
    pub async fn upload_image(&self, path: impl AsRef<Path>) -> Option<String> {
        self.upload(path, UploadKind::Image, true).await
    }

    /// Upload a mask, overwriting any existing file of that name.
    pub async fn upload_mask(&self, path: impl AsRef<Path>) -> Option<String> {
        self.upload(path, UploadKind::Mask, true).await
    }

    async fn try_upload(&self, path: &Path, kind: UploadKind, overwrite: bool) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ComfyError::Io {
            context: format!("Failed to read {}", path.display()),
            source: e,
        })?;
        let request =
            protocol::upload_request(kind, protocol::upload_file_name(path), bytes, overwrite);
        protocol::parse_upload(self.send(request).await?)
    }

    // ── Control ─────────────────────────────────────────────────────

    /// Ask the server to stop the running prompt. `true` means the request
    /// was accepted, not that execution has stopped.
    pub async fn interrupt(&self) -> bool {
        match self.send(protocol::interrupt_request()).await {
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
    pub async fn object_info(&self, node_class: &str) -> Option<JsonMap> {
        let result = match self.send(protocol::object_info_request(node_class)).await {
            Ok(resp) => protocol::json_object(resp),
            Err(e) => Err(e),
        };
        or_log(result, "object info")
    }

    /// Enumerated choices for a required input of a node class.
    pub async fn input_choices(&self, node_class: &str, input: &str) -> Vec<String> {
        self.object_info(node_class)
            .await
            .map(|info| protocol::input_choices(&info, node_class, input))
            .unwrap_or_default()
    }

    /// List available checkpoint models.
    pub async fn checkpoints(&self) -> Vec<String> {
        self.input_choices("CheckpointLoaderSimple", "ckpt_name").await
    }

    /// List available sampler algorithms.
    pub async fn samplers(&self) -> Vec<String> {
        self.input_choices("KSampler", "sampler_name").await
    }

    /// List available scheduler algorithms.
    pub async fn schedulers(&self) -> Vec<String> {
        self.input_choices("KSampler", "scheduler").await
    }

    // ── Queue / history ─────────────────────────────────────────────

    /// Raw `/queue` response, empty on failure.
    pub async fn queue_state(&self) -> JsonMap {
        self.fetch_map(protocol::queue_request(), "queue").await
    }

    /// Running and pending prompt counts.
    pub async fn queue_status(&self) -> QueueStatus {
        protocol::queue_status(&self.queue_state().await)
    }

    /// Full history, or the entry for one prompt. Empty on failure.
    pub async fn history(&self, prompt_id: Option<&str>) -> JsonMap {
        self.fetch_map(protocol::history_request(prompt_id), "history")
            .await
    }

    async fn fetch_map(&self, request: ApiRequest, operation: &str) -> JsonMap {
        let result = match self.send(request).await {
            Ok(resp) => protocol::json_object(resp),
            Err(e) => Err(e),
        };
        or_log(result, operation).unwrap_or_default()
    }

    // ── Files ───────────────────────────────────────────────────────

    /// Download a stored file by its three-part address.
    pub async fn view(&self, filename: &str, subfolder: &str, folder_type: &str) -> Option<Vec<u8>> {
        let request = protocol::view_request(filename, subfolder, folder_type);
        let result = match self.send(request).await {
            Ok(resp) => protocol::ensure_ok(resp).map(|r| r.body),
            Err(e) => Err(e),
        };
        or_log(result, "download")
    }

    /// Download the file a descriptor points at.
    pub async fn download(&self, file: &ArtifactRef) -> Option<Vec<u8>> {
        self.view(&file.filename, &file.subfolder, &file.folder_type)
            .await
    }

    // ── Prompt lifecycle ────────────────────────────────────────────

    /// Queue a workflow for execution. Returns the `prompt_id`.
    pub async fn submit(&self, workflow: &Value) -> Option<String> {
        let request = protocol::submit_request(workflow, self.config.client_id.as_deref());
        let result = match self.send(request).await {
            Ok(resp) => protocol::parse_submit(resp),
            Err(e) => Err(e),
        };
        let prompt_id = or_log(result, "submit")?;
        info!(prompt_id = %prompt_id, "prompt queued");
        Some(prompt_id)
    }

    /// Poll history until the prompt appears, then return its outputs.
    ///
    /// There is no timeout: an unknown or stuck prompt is polled forever.
    /// Use [`await_completion_with`](Self::await_completion_with) to bound it.
    pub async fn await_completion(&self, prompt_id: &str, interval: Duration) -> JsonMap {
        self.await_completion_with(prompt_id, &PollOptions::new(interval))
            .await
            .unwrap_or_default()
    }

    /// Poll history until the prompt appears, the deadline passes, or the
    /// cancellation flag is raised.
    pub async fn await_completion_with(
        &self,
        prompt_id: &str,
        options: &PollOptions,
    ) -> Result<JsonMap> {
        let start = tokio::time::Instant::now();
        let mut polls: u64 = 0;
        loop {
            if options.is_cancelled() {
                return Err(ComfyError::Cancelled(prompt_id.to_string()));
            }
            if options.is_expired(start.elapsed()) {
                return Err(ComfyError::Timeout(prompt_id.to_string()));
            }

            polls += 1;
            let history = self.history(Some(prompt_id)).await;
            if let Some(outputs) = protocol::completed_outputs(&history, prompt_id) {
                info!(prompt_id = %prompt_id, polls, "prompt completed");
                return Ok(outputs);
            }
            debug!(prompt_id = %prompt_id, polls, "prompt not in history yet");
            tokio::time::sleep(options.interval).await;
        }
    }

    /// Download every file listed in a prompt's outputs.
    ///
    /// Failed or empty downloads are skipped.
    pub async fn collect_artifacts(&self, outputs: &JsonMap) -> Vec<Artifact> {
        let mut artifacts = Vec::new();
        for file in protocol::extract_artifact_refs(outputs) {
            match self.download(&file).await {
                Some(bytes) if !bytes.is_empty() => {
                    artifacts.push(Artifact::from_ref(bytes, &file));
                }
                _ => debug!(filename = %file.filename, "skipping artifact with no data"),
            }
        }
        artifacts
    }

    /// Submit a workflow, wait for it, and download everything it produced.
    ///
    /// Returns an empty list if submission fails.
    pub async fn run_to_artifacts(&self, workflow: &Value) -> Vec<Artifact> {
        let options = PollOptions::new(self.config.poll_interval);
        self.run_to_artifacts_with(workflow, &options).await
    }

    /// Like [`run_to_artifacts`](Self::run_to_artifacts) with a bounded wait.
    pub async fn run_to_artifacts_with(
        &self,
        workflow: &Value,
        options: &PollOptions,
    ) -> Vec<Artifact> {
        let Some(prompt_id) = self.submit(workflow).await else {
            return Vec::new();
        };
        match self.await_completion_with(&prompt_id, options).await {
            Ok(outputs) => self.collect_artifacts(&outputs).await,
            Err(e) => {
                warn!(error = %e, "gave up waiting for prompt");
                Vec::new()
            }
        }
    }
}
