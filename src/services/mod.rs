pub mod cache;
pub mod recognition;
pub mod translation;

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{Config, ServiceConfig};
use crate::core::errors::ConfigError;

// Re-export commonly used services
pub use cache::{CacheEntry, CacheMatch, ResultStore, StoreStats};
pub use recognition::{Recognizer, VisionRecognizer};
pub use translation::{translator_for, Translator};

/// Boundary collaborators for one translation service selection
#[derive(Clone)]
pub struct Services {
    pub settings: ServiceConfig,
    pub recognizer: Arc<dyn Recognizer>,
    pub translator: Arc<dyn Translator>,
}

impl Services {
    /// Resolve the configured services and build their HTTP clients.
    ///
    /// A configuration problem is returned, not raised: the page pipeline
    /// reports it per page so the user can fix the config and retry.
    pub fn from_config(config: &Config, http_client: reqwest::Client) -> Result<Self, ConfigError> {
        let settings = config.service_config()?;
        let vision_key = config.vision_api_key()?.to_string();

        let recognizer = Arc::new(VisionRecognizer::new(
            vision_key,
            config.recognition.language_hints.clone(),
            http_client.clone(),
        ));
        let translator = translator_for(&settings, http_client);

        Ok(Self {
            settings,
            recognizer,
            translator,
        })
    }
}

/// Shared HTTP client with timeouts and connection pooling
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(10))
        .build()
}
