// Google Cloud Vision client for document text detection
// Sends the whole page in one images:annotate call and groups symbols by block

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use super::Recognizer;
use crate::core::errors::{RecognitionError, RecognitionResult};
use crate::core::types::{RecognizedRegion, Vertex};

/// Cloud Vision annotate endpoint
const VISION_API_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Cloud Vision recognizer authenticated with an API key
pub struct VisionRecognizer {
    api_key: String,
    language_hints: Vec<String>,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    pages: Vec<AnnotationPage>,
}

#[derive(Debug, Deserialize)]
struct AnnotationPage {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Block {
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<ApiVertex>,
}

/// Vision omits zero coordinates
#[derive(Debug, Deserialize)]
struct ApiVertex {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    #[serde(default)]
    symbols: Vec<Symbol>,
}

#[derive(Debug, Deserialize)]
struct Symbol {
    #[serde(default)]
    text: String,
}

impl VisionRecognizer {
    pub fn new(api_key: String, language_hints: Vec<String>, http_client: reqwest::Client) -> Self {
        Self {
            api_key,
            language_hints,
            http_client,
        }
    }

    fn build_request(&self, image: &[u8]) -> serde_json::Value {
        json!({
            "requests": [{
                "image": { "content": general_purpose::STANDARD.encode(image) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
                "imageContext": { "languageHints": self.language_hints },
            }]
        })
    }
}

#[async_trait]
impl Recognizer for VisionRecognizer {
    #[instrument(skip(self, image), fields(image_bytes = image.len()))]
    async fn recognize(&self, image: &[u8]) -> RecognitionResult<Vec<RecognizedRegion>> {
        let start = Instant::now();

        let response = self
            .http_client
            .post(VISION_API_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.build_request(image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Vision API error ({}): {}", status, message);
            return Err(RecognitionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))?;

        let regions = regions_from_response(body)?;

        info!(
            "Detected {} text blocks in {:.2}s",
            regions.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(regions)
    }
}

fn regions_from_response(body: AnnotateResponse) -> RecognitionResult<Vec<RecognizedRegion>> {
    let Some(first) = body.responses.into_iter().next() else {
        return Err(RecognitionError::InvalidResponse(
            "response contained no results".to_string(),
        ));
    };

    if let Some(status) = first.error {
        return Err(RecognitionError::Api {
            status: status.code.max(0) as u16,
            message: status.message,
        });
    }

    match first.full_text_annotation {
        Some(annotation) => Ok(organize_annotation(annotation)),
        None => {
            debug!("No text found");
            Ok(Vec::new())
        }
    }
}

/// Flatten an annotation into one region per block, in page then block order.
fn organize_annotation(annotation: TextAnnotation) -> Vec<RecognizedRegion> {
    annotation
        .pages
        .into_iter()
        .flat_map(|page| page.blocks)
        .map(|block| {
            let text = block
                .paragraphs
                .iter()
                .flat_map(|p| &p.words)
                .flat_map(|w| &w.symbols)
                .map(|s| s.text.as_str())
                .collect::<String>();

            let polygon = block
                .bounding_box
                .map(|bb| {
                    bb.vertices
                        .into_iter()
                        .map(|v| Vertex { x: v.x, y: v.y })
                        .collect()
                })
                .unwrap_or_default();

            RecognizedRegion { text, polygon }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "responses": [{
            "fullTextAnnotation": {
                "pages": [{
                    "blocks": [
                        {
                            "boundingBox": {"vertices": [{"x": 10, "y": 20}, {"x": 50, "y": 20}, {"x": 50, "y": 80}, {"y": 80}]},
                            "paragraphs": [
                                {"words": [{"symbols": [{"text": "こ"}, {"text": "ん"}]}, {"symbols": [{"text": "に"}]}]},
                                {"words": [{"symbols": [{"text": "ち"}, {"text": "は"}]}]}
                            ]
                        },
                        {
                            "boundingBox": {"vertices": [{"x": 100, "y": 5}]},
                            "paragraphs": [{"words": [{"symbols": [{"text": "え"}, {"text": "？"}]}]}]
                        }
                    ]
                }]
            }
        }]
    }"#;

    #[test]
    fn test_organize_annotation_concatenates_symbols() {
        let body: AnnotateResponse = serde_json::from_str(SAMPLE).unwrap();
        let regions = regions_from_response(body).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text, "こんにちは");
        assert_eq!(regions[1].text, "え？");
        assert_eq!(regions[0].polygon[0], Vertex { x: 10, y: 20 });
        // Missing coordinates default to zero
        assert_eq!(regions[0].polygon[3], Vertex { x: 0, y: 80 });
    }

    #[test]
    fn test_no_annotation_is_empty_result() {
        let body: AnnotateResponse = serde_json::from_str(r#"{"responses": [{}]}"#).unwrap();
        assert!(regions_from_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_response_error_is_failure() {
        let body: AnnotateResponse = serde_json::from_str(
            r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#,
        )
        .unwrap();

        match regions_from_response(body) {
            Err(RecognitionError::Api { status, message }) => {
                assert_eq!(status, 3);
                assert_eq!(message, "Bad image data.");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_request_carries_language_hints() {
        let recognizer = VisionRecognizer::new(
            "key".to_string(),
            vec!["ja".to_string()],
            reqwest::Client::new(),
        );
        let request = recognizer.build_request(b"img");

        assert_eq!(
            request["requests"][0]["imageContext"]["languageHints"][0],
            "ja"
        );
        assert_eq!(
            request["requests"][0]["features"][0]["type"],
            "DOCUMENT_TEXT_DETECTION"
        );
    }
}
