// In-process recognizer and translator doubles for pipeline tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::page::{Page, PageLoader};
use super::redraw::{PipelineEvent, RedrawHandle};
use crate::core::config::{ServiceConfig, TranslationService};
use crate::core::errors::{ConfigError, RecognitionError, RecognitionResult, TranslationError, TranslationResult};
use crate::core::types::{PageStatus, RecognizedRegion, Vertex};
use crate::services::cache::ResultStore;
use crate::services::recognition::Recognizer;
use crate::services::translation::Translator;
use crate::services::Services;
use crate::utils::image_ops::tests::png_bytes;
use crate::utils::{content_hash, Metrics};

/// Texts that make [`MockTranslator`] fail the whole batch
pub const POISON_TEXT: &str = "<untranslatable>";

/// Closed gate; call [`open_gate`] to let every waiting call through
pub fn closed_gate() -> Arc<Semaphore> {
    Arc::new(Semaphore::new(0))
}

pub fn open_gate(gate: &Semaphore) {
    gate.add_permits(1024);
}

/// Recognizer returning canned texts per image hash
#[derive(Default)]
pub struct MockRecognizer {
    calls: AtomicUsize,
    texts_by_hash: Mutex<HashMap<String, Vec<String>>>,
    failing_hashes: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn with_texts(self, image_hash: &str, texts: &[&str]) -> Self {
        self.texts_by_hash.lock().insert(
            image_hash.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn failing_for(self, image_hash: &str) -> Self {
        self.failing_hashes.lock().push(image_hash.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn recognize(&self, image: &[u8]) -> RecognitionResult<Vec<RecognizedRegion>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|e| RecognitionError::Api {
                status: 0,
                message: e.to_string(),
            })?;
        }

        let hash = content_hash(image);
        if self.failing_hashes.lock().contains(&hash) {
            return Err(RecognitionError::Api {
                status: 503,
                message: "recognizer unavailable".to_string(),
            });
        }

        // Unknown images get two texts derived from their hash
        let texts = self
            .texts_by_hash
            .lock()
            .get(&hash)
            .cloned()
            .unwrap_or_else(|| vec![format!("{}-a", &hash[..8]), format!("{}-b", &hash[..8])]);

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let y = i as i32 * 10;
                RecognizedRegion {
                    text,
                    polygon: vec![
                        Vertex { x: 0, y },
                        Vertex { x: 5, y },
                        Vertex { x: 5, y: y + 5 },
                        Vertex { x: 0, y: y + 5 },
                    ],
                }
            })
            .collect())
    }
}

/// Deterministic translation used by [`MockTranslator`]
pub fn mock_translation(text: &str) -> String {
    format!("en({})", text)
}

/// Translator that wraps each text, with optional per-text latency
#[derive(Default)]
pub struct MockTranslator {
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
    drop_last: bool,
    jitter: bool,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep a text-dependent amount before answering, so concurrent
    /// batches finish out of submission order
    pub fn with_jitter() -> Self {
        Self {
            jitter: true,
            ..Self::default()
        }
    }

    /// Return one translation fewer than submitted
    pub fn dropping_last() -> Self {
        Self {
            drop_last: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        texts: &[String],
        _source_language: Option<&str>,
        _target_language: &str,
    ) -> TranslationResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().push(texts.to_vec());

        if self.jitter {
            let spread: usize = texts.iter().flat_map(|t| t.bytes()).map(usize::from).sum();
            tokio::time::sleep(Duration::from_millis((spread % 23) as u64)).await;
        }

        if texts.iter().any(|t| t == POISON_TEXT) {
            return Err(TranslationError::Api {
                status: 456,
                message: "quota exceeded".to_string(),
            });
        }

        let mut translated: Vec<String> = texts.iter().map(|t| mock_translation(t)).collect();
        if self.drop_last {
            translated.pop();
        }
        Ok(translated)
    }
}

pub fn google_settings() -> ServiceConfig {
    ServiceConfig {
        service: TranslationService::Google,
        source_language: None,
        target_language: "en".to_string(),
        api_key: "google-test-key".to_string(),
    }
}

pub fn deepl_settings() -> ServiceConfig {
    ServiceConfig {
        service: TranslationService::DeepL,
        source_language: Some("JA".to_string()),
        target_language: "EN-US".to_string(),
        api_key: "deepl-test-key:fx".to_string(),
    }
}

pub fn mock_services(
    settings: ServiceConfig,
    recognizer: Arc<MockRecognizer>,
    translator: Arc<MockTranslator>,
) -> Services {
    Services {
        settings,
        recognizer,
        translator,
    }
}

/// Loader plus the receiving end of its redraw channel
pub struct Harness {
    pub loader: Arc<PageLoader>,
    pub store: Arc<ResultStore>,
    pub metrics: Metrics,
    pub events: tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>,
}

pub fn harness(cache_dir: &Path, services: Result<Services, ConfigError>) -> Harness {
    let metrics = Metrics::new();
    let store = Arc::new(ResultStore::open(cache_dir, Some(metrics.clone())).unwrap());
    let (redraw, events) = RedrawHandle::channel();
    let loader = Arc::new(PageLoader::new(
        Arc::clone(&store),
        services,
        reqwest::Client::new(),
        redraw,
        Some(metrics.clone()),
    ));
    Harness {
        loader,
        store,
        metrics,
        events,
    }
}

/// Write a distinct PNG for `seed` and return its path and content hash
pub fn write_page(dir: &Path, name: &str, seed: u8) -> (PathBuf, String) {
    let bytes = png_bytes(16, 12, seed);
    let path = dir.join(name);
    std::fs::write(&path, &bytes).unwrap();
    (path, content_hash(&bytes))
}

/// Poll until the page reaches Done
pub async fn wait_done(page: &Page) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while page.status() != PageStatus::Done {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("page did not finish loading");
}
