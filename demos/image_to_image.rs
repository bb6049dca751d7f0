//! Upload a local image and reference it from a LoadImage node.
//!
//! ```sh
//! cargo run --example image_to_image -- path/to/input.png
//! ```

use comfyui_client::blocking::ComfyClient;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let image_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "test_input.png".to_string());
    if !std::path::Path::new(&image_path).exists() {
        eprintln!("Usage: image_to_image <image_path>");
        return Ok(());
    }

    let client = ComfyClient::new("127.0.0.1:8188");

    println!("Uploading {}...", image_path);
    let Some(uploaded_name) = client.upload_image(&image_path) else {
        eprintln!("Upload failed");
        return Ok(());
    };
    println!("Stored as {}", uploaded_name);

    // Only the LoadImage node is shown; splice it into a full img2img graph.
    let workflow = json!({
        "10": {
            "class_type": "LoadImage",
            "inputs": {"image": uploaded_name}
        }
    });
    println!("{}", serde_json::to_string_pretty(&workflow)?);

    Ok(())
}
