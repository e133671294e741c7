pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, ServiceConfig, TranslationService};
pub use errors::{
    ConfigError, PipelineError, RecognitionError, StoreError, TranslationError,
};
pub use types::{
    BlockColor, ImageInfo, PageSnapshot, PageStatus, RecognizedRegion, TextBlock, Vertex,
};
