//! Run a workflow with the async client and a bounded wait.
//!
//! Reads the workflow JSON (API format) from the path given as the first
//! argument.
//!
//! ```sh
//! cargo run --example async_workflow -- workflow_api.json
//! ```

use comfyui_client::{ClientConfig, ComfyClient, PollOptions};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("Usage: async_workflow <workflow_api.json>");
        return Ok(());
    };
    let workflow: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;

    let config = ClientConfig::builder()
        .url("http://127.0.0.1:8188")
        .client_id("async-example")
        .build();
    let client = ComfyClient::with_config(config);

    let options = PollOptions::new(Duration::from_secs(1)).with_deadline(Duration::from_secs(600));
    let artifacts = client
        .scoped(|c| async move { c.run_to_artifacts_with(&workflow, &options).await })
        .await;

    println!("Generated {} file(s)", artifacts.len());
    for artifact in &artifacts {
        let path = artifact.save()?;
        println!("  {} [{}] -> {}", artifact.filename(), artifact.kind(), path.display());
    }

    Ok(())
}
