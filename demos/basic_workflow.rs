//! Queue a text-to-image workflow and save every file it produces.
//!
//! Requires a running ComfyUI instance with the referenced checkpoint.
//!
//! ```sh
//! RUST_LOG=comfyui_client=debug cargo run --example basic_workflow
//! ```

use comfyui_client::blocking::ComfyClient;
use comfyui_client::ArtifactKind;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = ComfyClient::from_legacy_address("127.0.0.1:8188", false);

    let seed = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() % 1_000_000_000;
    let workflow = json!({
        "3": {
            "class_type": "KSampler",
            "inputs": {
                "seed": seed,
                "steps": 20,
                "cfg": 8,
                "sampler_name": "euler",
                "scheduler": "normal",
                "denoise": 1,
                "model": ["4", 0],
                "positive": ["6", 0],
                "negative": ["7", 0],
                "latent_image": ["5", 0]
            }
        },
        "4": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": {"ckpt_name": "v1-5-pruned-emaonly.ckpt"}
        },
        "5": {
            "class_type": "EmptyLatentImage",
            "inputs": {"width": 512, "height": 512, "batch_size": 1}
        },
        "6": {
            "class_type": "CLIPTextEncode",
            "inputs": {"text": "a glass bottle holding a purple galaxy, landscape", "clip": ["4", 1]}
        },
        "7": {
            "class_type": "CLIPTextEncode",
            "inputs": {"text": "text, watermark", "clip": ["4", 1]}
        },
        "8": {
            "class_type": "VAEDecode",
            "inputs": {"samples": ["3", 0], "vae": ["4", 2]}
        },
        "9": {
            "class_type": "SaveImage",
            "inputs": {"filename_prefix": "ComfyUI", "images": ["8", 0]}
        }
    });

    println!("Queueing workflow...");
    let results = client.run_to_artifacts(&workflow);
    if results.is_empty() {
        eprintln!("No outputs (is ComfyUI running?)");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let filename = format!("output_basic_{}.png", i);
        println!("Saving {} ({})", filename, result.kind());
        result.save_as(&filename)?;

        if result.kind() == ArtifactKind::Image {
            result.preview()?;
        }
    }

    Ok(())
}
