// Library exports for the manga page translation pipeline
//
// Pages are recognized, translated and cached in the background while the
// viewer moves through them.

// Core modules
pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::{Config, ServiceConfig, TranslationService},
    errors::{ConfigError, PipelineError, RecognitionError, StoreError, TranslationError},
    types::{BlockColor, ImageInfo, PageSnapshot, PageStatus, RecognizedRegion, TextBlock, Vertex},
};

pub use orchestration::{
    LoadOutcome, Page, PageLoader, PageSequence, PipelineEvent, RedrawHandle, RedrawObserver,
};

pub use services::{
    build_http_client, CacheMatch, Recognizer, ResultStore, Services, StoreStats, Translator,
    VisionRecognizer,
};

pub use utils::{content_hash, load_image, ImageSource, Metrics, MetricsSnapshot};
