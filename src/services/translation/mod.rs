pub mod deepl;
pub mod google;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::{ServiceConfig, TranslationService};
use crate::core::errors::{TranslationError, TranslationResult};

pub use deepl::DeepLTranslator;
pub use google::GoogleTranslator;

/// Batch translation boundary.
///
/// The output is positional: entry `i` is the translation of input `i`.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        texts: &[String],
        source_language: Option<&str>,
        target_language: &str,
    ) -> TranslationResult<Vec<String>>;
}

/// Build the client for the selected translation service
pub fn translator_for(service: &ServiceConfig, http_client: reqwest::Client) -> Arc<dyn Translator> {
    match service.service {
        TranslationService::Google => {
            Arc::new(GoogleTranslator::new(service.api_key.clone(), http_client))
        }
        TranslationService::DeepL => {
            Arc::new(DeepLTranslator::new(service.api_key.clone(), http_client))
        }
    }
}

/// Reject responses that would break the positional correspondence
pub(crate) fn ensure_same_length(submitted: usize, translated: Vec<String>) -> TranslationResult<Vec<String>> {
    if translated.len() != submitted {
        return Err(TranslationError::LengthMismatch {
            submitted,
            returned: translated.len(),
        });
    }
    Ok(translated)
}
