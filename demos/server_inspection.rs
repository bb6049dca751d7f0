//! Inspect queue, node definitions and history without queueing anything.
//!
//! ```sh
//! cargo run --example server_inspection
//! ```

use comfyui_client::blocking::ComfyClient;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = ComfyClient::new("http://127.0.0.1:8188");

    println!("Getting queue info...");
    let queue = client.queue_status();
    println!("Pending: {}, Running: {}", queue.pending, queue.running);

    println!("\nGetting info for KSampler...");
    if let Some(info) = client.object_info("KSampler") {
        let inputs: Vec<_> = info
            .get("KSampler")
            .and_then(|n| n.pointer("/input/required"))
            .and_then(|r| r.as_object())
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        println!("KSampler inputs: {:?}", inputs);
    }
    println!("Samplers: {:?}", client.samplers());
    println!("Schedulers: {:?}", client.schedulers());

    println!("\nGetting history...");
    println!("Total history items: {}", client.history(None).len());
}
