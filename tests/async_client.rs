mod test_helpers;

use comfyui_client::{
    ApiResponse, ArtifactKind, ClientConfig, ComfyClient, ComfyError, PollOptions,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use test_helpers::*;

fn client(server: FakeServer) -> ComfyClient<FakeServer> {
    let config = ClientConfig::builder()
        .url("http://127.0.0.1:8188")
        .poll_interval(Duration::from_secs(1))
        .build();
    ComfyClient::with_transport(config, server)
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_single_image() {
    let client = client(
        FakeServer::new()
            .accepting("abc123")
            .completes_after(1, single_image_outputs())
            .file("out.png", b"png bytes"),
    );

    let artifacts = client.run_to_artifacts(&sample_workflow()).await;

    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].kind(), ArtifactKind::Image);
    assert_eq!(artifacts[0].filename(), "out.png");

    let server = client.transport();
    assert_eq!(server.count("/history/abc123"), 2);
    let downloads = server.downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].query_value("filename"), Some("out.png"));
    assert_eq!(downloads[0].query_value("subfolder"), Some(""));
    assert_eq!(downloads[0].query_value("type"), Some("output"));
}

#[tokio::test(start_paused = true)]
async fn test_poll_waits_one_interval_per_miss() {
    let client = client(
        FakeServer::new()
            .accepting("abc123")
            .completes_after(4, single_image_outputs()),
    );

    let start = tokio::time::Instant::now();
    let outputs = client
        .await_completion("abc123", Duration::from_secs(2))
        .await;

    assert!(outputs.contains_key("9"));
    assert_eq!(client.transport().count("/history/abc123"), 5);
    assert_eq!(start.elapsed(), Duration::from_secs(8));
}

#[tokio::test]
async fn test_failed_submission_skips_polling() {
    let client = client(FakeServer::new().completes_after(0, single_image_outputs()));

    assert!(client.run_to_artifacts(&sample_workflow()).await.is_empty());
    assert_eq!(client.transport().count_prefix("/history"), 0);
    assert!(client.transport().downloads().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_downgrades_everything() {
    let client = client(FakeServer::new().unreachable());

    assert!(client.submit(&sample_workflow()).await.is_none());
    assert!(client.queue_state().await.is_empty());
    assert!(client.history(None).await.is_empty());
    assert!(client.object_info("KSampler").await.is_none());
    assert!(client.view("out.png", "", "output").await.is_none());
    assert!(!client.interrupt().await);
    assert!(client.upload_image("/no/such/file.png").await.is_none());
}

#[tokio::test]
async fn test_upload_image() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.png");
    std::fs::write(&path, b"pixels").unwrap();

    let client = client(
        FakeServer::new().route("/upload/image", ApiResponse::json(&json!({"name": "input.png"}))),
    );

    assert_eq!(client.upload_image(&path).await.as_deref(), Some("input.png"));
    let (file_name, fields) = multipart_fields(&client.transport().requests()[0]).unwrap();
    assert_eq!(file_name, "input.png");
    assert!(fields.contains(&("type".to_string(), "input".to_string())));
    assert!(fields.contains(&("overwrite".to_string(), "true".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_and_cancellation() {
    let client = client(FakeServer::new().accepting("stuck"));

    let options = PollOptions::new(Duration::from_secs(1)).with_deadline(Duration::from_secs(10));
    match client.await_completion_with("stuck", &options).await {
        Err(ComfyError::Timeout(id)) => assert_eq!(id, "stuck"),
        other => panic!("Expected timeout, got {:?}", other),
    }
    assert_eq!(client.transport().count("/history/stuck"), 10);

    let cancel = Arc::new(AtomicBool::new(false));
    let options = PollOptions::new(Duration::from_secs(1)).with_cancellation(cancel.clone());
    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.await_completion_with("stuck", &options).await })
    };
    tokio::time::sleep(Duration::from_millis(3500)).await;
    cancel.store(true, Ordering::Relaxed);

    assert!(matches!(waiter.await.unwrap(), Err(ComfyError::Cancelled(_))));
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_does_not_stop_waiting() {
    let client = client(
        FakeServer::new()
            .accepting("abc123")
            .completes_after(3, single_image_outputs())
            .route("/interrupt", ApiResponse::new(200, "")),
    );

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.await_completion("abc123", Duration::from_secs(1)).await })
    };
    assert!(client.interrupt().await);

    let outputs = waiter.await.unwrap();
    assert!(outputs.contains_key("9"));
    assert_eq!(client.transport().count("/history/abc123"), 4);
}

#[tokio::test]
async fn test_concurrent_reads_share_client() {
    let client = client(
        FakeServer::new()
            .route("/queue", ApiResponse::json(&json!({"queue_running": [], "queue_pending": [[1]]})))
            .route("/history", ApiResponse::json(&json!({"a": {}}))),
    );

    let (queue, history, status) = tokio::join!(
        client.queue_state(),
        client.history(None),
        client.queue_status()
    );

    assert!(queue.contains_key("queue_running"));
    assert_eq!(history.len(), 1);
    assert_eq!(status.pending, 1);
    assert_eq!(client.transport().requests().len(), 3);
}

#[tokio::test]
async fn test_scoped_closes_session() {
    let client = client(
        FakeServer::new().route("/history", ApiResponse::json(&json!({"a": {}, "b": {}}))),
    );

    let count = client
        .scoped(|c| async move { c.history(None).await.len() })
        .await;

    assert_eq!(count, 2);
    assert_eq!(client.transport().closes(), 1);

    client.close().await;
    assert_eq!(client.transport().closes(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scoped_closes_when_timed_out() {
    let client = client(
        FakeServer::new().route("/queue", ApiResponse::json(&json!({"queue_running": []}))),
    );

    let result = tokio::time::timeout(
        Duration::from_millis(500),
        client.scoped(|c| async move {
            c.queue_state().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        }),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(client.transport().count("/queue"), 1);
    assert_eq!(client.transport().closes(), 1);
}

#[tokio::test]
async fn test_scoped_closes_when_body_panics() {
    let client = client(FakeServer::new());

    let task = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .scoped(|c| async move {
                    c.queue_state().await;
                    panic!("workflow callback failed");
                })
                .await
        })
    };

    assert!(task.await.unwrap_err().is_panic());
    assert_eq!(client.transport().closes(), 1);
}

#[tokio::test]
async fn test_real_session_released_by_cancelled_scope() {
    let config = ClientConfig::builder()
        .url("127.0.0.1:9")
        .request_timeout(Duration::from_secs(2))
        .build();
    let client = ComfyClient::with_config(config);

    let result = tokio::time::timeout(
        Duration::from_millis(500),
        client.scoped(|c| async move {
            c.queue_state().await;
            std::future::pending::<()>().await
        }),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(client.transport().sessions_opened(), 1);
    assert!(!client.is_session_open());
}

#[tokio::test]
async fn test_real_session_lifecycle() {
    let config = ClientConfig::builder()
        .url("127.0.0.1:9")
        .request_timeout(Duration::from_secs(2))
        .build();
    let client = ComfyClient::with_config(config);

    assert!(!client.is_session_open());
    client.close().await;

    // Nothing listens on the discard port; the failure is downgraded.
    assert!(client.queue_state().await.is_empty());
    assert!(client.is_session_open());

    client.close().await;
    assert!(!client.is_session_open());
    client.close().await;
    assert!(!client.is_session_open());
}

#[tokio::test]
async fn test_concurrent_first_use_opens_one_session() {
    let config = ClientConfig::builder()
        .url("127.0.0.1:9")
        .request_timeout(Duration::from_secs(2))
        .build();
    let client = ComfyClient::with_config(config);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.interrupt().await })
        })
        .collect();
    for task in tasks {
        assert!(!task.await.unwrap());
    }

    assert!(client.is_session_open());
    assert_eq!(client.transport().sessions_opened(), 1);
    client.close().await;
    assert!(!client.is_session_open());
}
