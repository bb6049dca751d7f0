use thiserror::Error;

/// Errors produced while talking to a ComfyUI server.
///
/// Most client operations log these and hand back an empty value instead;
/// they surface directly from transports and from
/// [`await_completion_with`](crate::ComfyClient::await_completion_with).
#[derive(Error, Debug)]
pub enum ComfyError {
    /// ComfyUI returned a non-200 HTTP status.
    #[error("ComfyUI returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response from ComfyUI was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// The poll deadline elapsed before the prompt appeared in history.
    #[error("Timed out waiting for prompt {0}")]
    Timeout(String),

    /// The caller's cancellation flag was raised while polling.
    #[error("Waiting for prompt {0} was cancelled")]
    Cancelled(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// Failure reported by a caller-supplied transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local file access failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ComfyError>;
