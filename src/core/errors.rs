// Error types for the translation pipeline
//
// Using thiserror for ergonomic error definitions with:
// - Type-safe error matching
// - Display strings that double as the page status message
// - Source error chaining

use std::path::PathBuf;
use thiserror::Error;

/// Result store (on-disk cache) errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache file {path} is corrupt and cannot be decoded: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cache file {path} has unsupported version {found} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("Failed to encode cache: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to replace cache file {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache task failed: {0}")]
    TaskFailed(String),
}

/// Recognizer boundary errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Text detection request failed, check your internet connection: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Text detection failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid text detection response: {0}")]
    InvalidResponse(String),
}

/// Translator boundary errors
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Translation request failed, check your internet connection: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Translation request failed, ensure your API key and languages are correct ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Empty response from translation service")]
    EmptyResponse,

    #[error("Failed to parse translation response: {0}")]
    InvalidResponse(String),

    #[error("Translation service returned {returned} texts for {submitted} inputs")]
    LengthMismatch { submitted: usize, returned: usize },
}

/// Page pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("A page sequence needs at least one page")]
    EmptySequence,

    #[error("Failed to read image {source_name}: {reason}")]
    ImageLoad { source_name: String, reason: String },

    #[error("Image decode error for {source_name}: {source}")]
    ImageDecode {
        source_name: String,
        #[source]
        source: image::ImageError,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(r#"Your config does not have a valid selected service ({0}), use "google" or "deepL""#)]
    InvalidService(String),

    #[error("No API key configured for the {service} translation service")]
    MissingTranslationKey { service: String },

    #[error("No Cloud Vision API key configured (set VISION_API_KEY)")]
    MissingVisionKey,

    #[error("Prefetch window must be between 0 and {max}, got {value}")]
    InvalidPrefetchWindow { value: usize, max: usize },

    #[error("API timeout must be > 0 seconds")]
    InvalidTimeout,

    #[error("Invalid cache path: {0}")]
    InvalidCachePath(String),
}

// Convenience type aliases for Results
pub type StoreResult<T> = Result<T, StoreError>;
pub type RecognitionResult<T> = Result<T, RecognitionError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
