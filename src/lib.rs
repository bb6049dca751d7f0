//! # comfyui-client
//!
//! Rust client for [ComfyUI](https://github.com/comfyanonymous/ComfyUI):
//! upload inputs, queue a workflow, wait for it to finish and download what
//! it produced.
//!
//! Two clients share one protocol implementation:
//!
//! - [`ComfyClient`] is async (tokio) and keeps a lazily-opened HTTP session
//!   that can be closed explicitly or scoped with [`ComfyClient::scoped`].
//! - [`blocking::ComfyClient`] runs every call on the caller's thread.
//!
//! Operations do not return errors. A failed round trip is logged through
//! `tracing` and comes back as `None`, `false` or an empty map, so the caller
//! checks emptiness instead of handling faults.
//!
//! ## Quick Start
//!
//! ```no_run
//! use comfyui_client::{ArtifactKind, ComfyClient};
//! use serde_json::json;
//!
//! # async fn example() -> std::io::Result<()> {
//! let client = ComfyClient::new("127.0.0.1:8188");
//!
//! let workflow = json!({
//!     "9": {
//!         "class_type": "SaveImage",
//!         "inputs": {"filename_prefix": "ComfyUI", "images": ["8", 0]}
//!     }
//! });
//!
//! let artifacts = client
//!     .scoped(|c| async move { c.run_to_artifacts(&workflow).await })
//!     .await;
//!
//! for artifact in &artifacts {
//!     artifact.save()?;
//!     if artifact.kind() == ArtifactKind::Image {
//!         artifact.preview()?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Polling for completion has no deadline by default. Bound it with
//! [`PollOptions`]:
//!
//! ```no_run
//! use comfyui_client::{ComfyClient, PollOptions};
//! use std::time::Duration;
//!
//! # async fn example(client: ComfyClient, prompt_id: &str) {
//! let options = PollOptions::new(Duration::from_secs(1)).with_deadline(Duration::from_secs(300));
//! match client.await_completion_with(prompt_id, &options).await {
//!     Ok(outputs) => println!("{} output nodes", outputs.len()),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # }
//! ```

pub mod artifact;
pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;

pub use artifact::{Artifact, ArtifactKind, ImageViewer, SystemViewer};
pub use client::ComfyClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ComfyError, Result};
pub use protocol::{completed_outputs, extract_artifact_refs};
pub use transport::{
    ApiRequest, ApiResponse, AsyncTransport, BlockingHttpTransport, HttpTransport, Transport,
};
pub use types::{ArtifactRef, JsonMap, PollOptions, QueueStatus, UploadKind};
