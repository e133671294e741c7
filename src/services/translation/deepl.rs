use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use super::{ensure_same_length, Translator};
use crate::core::errors::{TranslationError, TranslationResult};

const DEEPL_API_URL: &str = "https://api.deepl.com/v2/translate";
const DEEPL_FREE_API_URL: &str = "https://api-free.deepl.com/v2/translate";

/// Used when no target language is configured
const DEFAULT_TARGET_LANGUAGE: &str = "EN-US";

/// DeepL API client
pub struct DeepLTranslator {
    api_key: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct DeepLTranslation {
    #[serde(default)]
    detected_source_language: String,
    text: String,
}

impl DeepLTranslator {
    pub fn new(api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            api_key,
            http_client,
        }
    }

    /// Free-tier keys end in ":fx" and live on a separate host
    fn endpoint(&self) -> &'static str {
        if self.api_key.ends_with(":fx") {
            DEEPL_FREE_API_URL
        } else {
            DEEPL_API_URL
        }
    }

    fn form_params<'a>(
        texts: &'a [String],
        source_language: Option<&'a str>,
        target_language: &'a str,
    ) -> Vec<(&'static str, &'a str)> {
        let mut params: Vec<(&'static str, &'a str)> =
            texts.iter().map(|t| ("text", t.as_str())).collect();
        if let Some(source) = source_language.filter(|s| !s.is_empty()) {
            params.push(("source_lang", source));
        }
        let target = if target_language.is_empty() {
            DEFAULT_TARGET_LANGUAGE
        } else {
            target_language
        };
        params.push(("target_lang", target));
        params.push(("model_type", "quality_optimized"));
        params
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    #[instrument(skip(self, texts), fields(texts = texts.len()))]
    async fn translate(
        &self,
        texts: &[String],
        source_language: Option<&str>,
        target_language: &str,
    ) -> TranslationResult<Vec<String>> {
        debug!(
            "DeepL: source={:?} target={}",
            source_language, target_language
        );
        let start = Instant::now();

        let response = self
            .http_client
            .post(self.endpoint())
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&Self::form_params(texts, source_language, target_language))
            .send()
            .await?;

        let status = response.status();
        let data = response.bytes().await?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&data).into_owned();
            error!("DeepL API error ({}): {}", status, message);
            return Err(TranslationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if data.is_empty() {
            return Err(TranslationError::EmptyResponse);
        }

        let parsed: DeepLResponse = serde_json::from_slice(&data)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        let translated: Vec<String> = parsed.translations.into_iter().map(|t| t.text).collect();

        info!(
            "DeepL: translated {} texts in {:.2}s",
            translated.len(),
            start.elapsed().as_secs_f64()
        );
        ensure_same_length(texts.len(), translated)
    }
}
