//! Quick recognition check: run Cloud Vision on one image and print the regions
//! Run with: cargo run --release --bin recognize -- <image path or URL>

use anyhow::{Context, Result};
use tracing::info;

use manga_translator::{
    build_http_client, load_image, Config, ImageSource, Recognizer, TextBlock, VisionRecognizer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("manga_translator::services::recognition=debug")
        .with_target(false)
        .init();

    let source = std::env::args()
        .nth(1)
        .map(|arg| ImageSource::parse(&arg))
        .unwrap_or_else(|| ImageSource::parse("test_sample.png"));

    let config = Config::new().context("Failed to load configuration")?;
    let api_key = config.vision_api_key()?.to_string();
    let http_client = build_http_client(config.api_timeout())?;

    info!("Loading image: {}", source);
    let image = load_image(&source, &http_client).await?;
    info!(
        "Image dimensions: {}x{} (xxh3:{})",
        image.info.width, image.info.height, image.info.hash
    );

    let recognizer = VisionRecognizer::new(api_key, config.recognition.language_hints.clone(), http_client);
    let regions = recognizer.recognize(&image.bytes).await?;
    let blocks = TextBlock::from_regions(regions);

    println!("\n=== Results ===");
    if blocks.is_empty() {
        println!("  (no text)");
    }
    for (i, block) in blocks.iter().enumerate() {
        let corners: Vec<String> = block
            .vertices
            .iter()
            .map(|v| format!("({},{})", v.x, v.y))
            .collect();
        println!("  {}. {} {}", i + 1, block.text.replace('\n', " "), corners.join(" "));
    }

    Ok(())
}
