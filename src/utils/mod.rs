pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{content_hash, load_image, ImageSource, LoadedImage};
pub use metrics::{Metrics, MetricsSnapshot};
