//! Request shapes and response interpretation shared by both clients.

use serde_json::{json, Value};
use std::path::Path;
use tracing::warn;

use crate::error::{ComfyError, Result};
use crate::transport::{ApiRequest, ApiResponse, FilePart};
use crate::types::{ArtifactRef, JsonMap, QueueStatus, UploadKind};

pub(crate) fn upload_request(
    kind: UploadKind,
    file_name: String,
    bytes: Vec<u8>,
    overwrite: bool,
) -> ApiRequest {
    let file = FilePart {
        field: "image".to_string(),
        file_name,
        bytes,
    };
    ApiRequest::post(kind.path()).multipart(
        file,
        vec![
            ("type".to_string(), "input".to_string()),
            ("overwrite".to_string(), overwrite.to_string()),
        ],
    )
}

/// Final path component, used as the uploaded file's name.
pub(crate) fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub(crate) fn interrupt_request() -> ApiRequest {
    ApiRequest::post("/interrupt")
}

pub(crate) fn object_info_request(node_class: &str) -> ApiRequest {
    ApiRequest::get(format!("/object_info/{}", node_class))
}

pub(crate) fn queue_request() -> ApiRequest {
    ApiRequest::get("/queue")
}

pub(crate) fn history_request(prompt_id: Option<&str>) -> ApiRequest {
    match prompt_id {
        Some(id) => ApiRequest::get(format!("/history/{}", id)),
        None => ApiRequest::get("/history"),
    }
}

pub(crate) fn view_request(filename: &str, subfolder: &str, folder_type: &str) -> ApiRequest {
    ApiRequest::get("/view")
        .query("filename", filename)
        .query("subfolder", subfolder)
        .query("type", folder_type)
}

pub(crate) fn submit_request(workflow: &Value, client_id: Option<&str>) -> ApiRequest {
    let mut body = json!({ "prompt": workflow });
    if let Some(id) = client_id {
        body["client_id"] = json!(id);
    }
    ApiRequest::post("/prompt").json(body)
}

/// Reject anything but a 200.
pub(crate) fn ensure_ok(resp: ApiResponse) -> Result<ApiResponse> {
    if resp.is_ok() {
        Ok(resp)
    } else {
        Err(ComfyError::Http {
            status: resp.status,
            body: resp.text(),
        })
    }
}

/// Parse a 200 response whose body is a JSON object.
pub(crate) fn json_object(resp: ApiResponse) -> Result<JsonMap> {
    match ensure_ok(resp)?.parse_json()? {
        Value::Object(map) => Ok(map),
        other => Err(ComfyError::InvalidResponse(format!(
            "Expected a JSON object, got {}",
            other
        ))),
    }
}

pub(crate) fn parse_upload(resp: ApiResponse) -> Result<String> {
    json_object(resp)?
        .get("name")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| ComfyError::InvalidResponse("Upload response missing name".into()))
}

pub(crate) fn parse_submit(resp: ApiResponse) -> Result<String> {
    let json = json_object(resp)?;

    if let Some(errors) = json.get("node_errors").and_then(|e| e.as_object()) {
        if !errors.is_empty() {
            let errors = Value::Object(errors.clone());
            warn!(node_errors = %errors, "prompt queued with node errors");
        }
    }

    json.get("prompt_id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| ComfyError::InvalidResponse("Response missing prompt_id".into()))
}

/// The prompt's `outputs` if `history` contains an entry for it.
///
/// An entry without a usable `outputs` object counts as complete with no
/// outputs.
pub fn completed_outputs(history: &JsonMap, prompt_id: &str) -> Option<JsonMap> {
    let entry = history.get(prompt_id)?;
    Some(
        entry
            .get("outputs")
            .and_then(|o| o.as_object())
            .cloned()
            .unwrap_or_default(),
    )
}

/// Flatten a prompt's outputs into downloadable file references.
///
/// Walks nodes, then output kinds (`images`, `gifs`, ...), then list items,
/// in the order the server sent them. Items that are not objects with string
/// `filename`, `subfolder` and `type` fields are skipped.
pub fn extract_artifact_refs(outputs: &JsonMap) -> Vec<ArtifactRef> {
    outputs
        .values()
        .filter_map(|node_output| node_output.as_object())
        .flat_map(|kinds| kinds.values())
        .filter_map(|items| items.as_array())
        .flatten()
        .filter_map(|item| serde_json::from_value::<ArtifactRef>(item.clone()).ok())
        .collect()
}

pub(crate) fn queue_status(queue: &JsonMap) -> QueueStatus {
    let count = |key: &str| {
        queue
            .get(key)
            .and_then(|v| v.as_array())
            .map(|a| a.len() as u32)
            .unwrap_or(0)
    };
    QueueStatus {
        running: count("queue_running"),
        pending: count("queue_pending"),
    }
}

/// Enumerated choices of a required node input, from `/object_info`.
pub(crate) fn input_choices(info: &JsonMap, node_class: &str, input: &str) -> Vec<String> {
    let pointer = format!("/{}/input/required/{}/0", node_class, input);
    Value::Object(info.clone())
        .pointer(&pointer)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Log a failed operation and turn it into `None`.
pub(crate) fn or_log<T>(result: Result<T>, operation: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "{} failed", operation);
            None
        }
    }
}
