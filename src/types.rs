use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A JSON object as returned by ComfyUI, in server order.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Location of a file stored by ComfyUI, as listed in a prompt's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    pub subfolder: String,
    /// Storage class such as `output` or `temp`, not the media kind.
    #[serde(rename = "type")]
    pub folder_type: String,
}

/// Which upload endpoint a local file goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Mask,
}

impl UploadKind {
    pub(crate) fn path(self) -> &'static str {
        match self {
            UploadKind::Image => "/upload/image",
            UploadKind::Mask => "/upload/mask",
        }
    }
}

/// Snapshot of ComfyUI's queue state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub running: u32,
    pub pending: u32,
}

/// Optional limits for waiting on a prompt.
///
/// The default has no deadline and no cancellation flag, which polls until
/// the prompt shows up in history.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Delay between history polls.
    pub interval: Duration,

    /// Give up once this much time has passed since the wait started.
    pub deadline: Option<Duration>,

    /// Stop waiting as soon as this flag is set.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: None,
            cancel: None,
        }
    }
}

impl PollOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    pub(crate) fn is_expired(&self, elapsed: Duration) -> bool {
        self.deadline.map(|d| elapsed >= d).unwrap_or(false)
    }
}
