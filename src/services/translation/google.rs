use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, instrument};

use super::{ensure_same_length, Translator};
use crate::core::errors::{TranslationError, TranslationResult};

/// Cloud Translation v2 endpoint
const GOOGLE_TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

/// Google Cloud Translation client authenticated with an API key
pub struct GoogleTranslator {
    api_key: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a [String],
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTranslation {
    translated_text: String,
}

impl GoogleTranslator {
    pub fn new(api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            api_key,
            http_client,
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    #[instrument(skip(self, texts), fields(texts = texts.len()))]
    async fn translate(
        &self,
        texts: &[String],
        source_language: Option<&str>,
        target_language: &str,
    ) -> TranslationResult<Vec<String>> {
        let start = Instant::now();

        let request = TranslateRequest {
            q: texts,
            target: target_language,
            source: source_language.filter(|s| !s.is_empty()),
            format: "text",
        };

        let response = self
            .http_client
            .post(GOOGLE_TRANSLATE_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let data = response.bytes().await?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&data).into_owned();
            error!("Google Translate API error ({}): {}", status, message);
            return Err(TranslationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if data.is_empty() {
            return Err(TranslationError::EmptyResponse);
        }

        let parsed: TranslateResponse = serde_json::from_slice(&data)
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        let translated: Vec<String> = parsed
            .data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect();

        info!(
            "Google: translated {} texts in {:.2}s",
            translated.len(),
            start.elapsed().as_secs_f64()
        );
        ensure_same_length(texts.len(), translated)
    }
}
