// Page state and the single-page load pipeline
//
// A page goes NotStarted -> Loading -> Done exactly once. The transition out
// of NotStarted is the only claim on a page; whoever wins it runs the load.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::redraw::RedrawHandle;
use crate::core::errors::{ConfigError, StoreError, StoreResult, TranslationError};
use crate::core::types::{ImageInfo, PageSnapshot, PageStatus, TextBlock};
use crate::services::cache::{CacheMatch, ResultStore};
use crate::services::Services;
use crate::utils::{load_image, ImageSource, Metrics};

pub const STATUS_LOADING: &str = "Loading...";
pub const STATUS_DETECTING: &str = "Detecting text...";
pub const STATUS_TRANSLATING: &str = "Translating text...";
pub const STATUS_DONE: &str = "Done!";

/// Mutable part of a page, always read and written under one lock
#[derive(Debug, Clone)]
pub struct PageState {
    pub status: PageStatus,
    pub ok: bool,
    pub status_message: String,
    pub image: Option<ImageInfo>,
    pub blocks: Vec<TextBlock>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            status: PageStatus::NotStarted,
            ok: false,
            status_message: String::new(),
            image: None,
            blocks: Vec::new(),
        }
    }
}

/// One page of the sequence
pub struct Page {
    index: usize,
    source: ImageSource,
    state: Mutex<PageState>,
}

impl Page {
    pub fn new(index: usize, source: ImageSource) -> Self {
        Self {
            index,
            source,
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn status(&self) -> PageStatus {
        self.state.lock().status
    }

    /// Consistent copy of the page; blocks are only visible once Done
    pub fn snapshot(&self) -> PageSnapshot {
        let state = self.state.lock();
        PageSnapshot {
            index: self.index,
            source: self.source.to_string(),
            status: state.status,
            ok: state.ok,
            status_message: state.status_message.clone(),
            image: state.image.clone(),
            blocks: if state.status == PageStatus::Done {
                state.blocks.clone()
            } else {
                Vec::new()
            },
        }
    }

    /// Claim the page: NotStarted -> Loading. Returns false if someone else
    /// already did.
    pub(crate) fn try_begin(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != PageStatus::NotStarted {
            return false;
        }
        state.status = PageStatus::Loading;
        state.status_message = STATUS_LOADING.to_string();
        true
    }

    fn set_progress(&self, message: &str) {
        self.state.lock().status_message = message.to_string();
    }

    fn set_image(&self, info: ImageInfo) {
        self.state.lock().image = Some(info);
    }

    fn finish_ok(&self, blocks: Vec<TextBlock>) {
        let mut state = self.state.lock();
        state.blocks = blocks;
        state.ok = true;
        state.status_message = STATUS_DONE.to_string();
        state.status = PageStatus::Done;
    }

    fn finish_err(&self, message: String) {
        let mut state = self.state.lock();
        state.blocks = Vec::new();
        state.ok = false;
        state.status_message = message;
        state.status = PageStatus::Done;
    }
}

/// Result of [`PageLoader::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was already Loading or Done; nothing ran
    AlreadyStarted,
    /// This call ran the pipeline to completion
    Finished { ok: bool },
}

/// Why a load stopped early
enum LoadFailure {
    /// Shown on the page; the rest of the sequence is unaffected
    Page(String),
    /// The result store itself failed; fatal for the process
    Store(StoreError),
}

impl From<StoreError> for LoadFailure {
    fn from(e: StoreError) -> Self {
        LoadFailure::Store(e)
    }
}

/// Runs the recognize / translate / persist pipeline for pages
pub struct PageLoader {
    store: Arc<ResultStore>,
    services: Result<Services, ConfigError>,
    http_client: reqwest::Client,
    redraw: RedrawHandle,
    metrics: Option<Metrics>,
}

impl PageLoader {
    pub fn new(
        store: Arc<ResultStore>,
        services: Result<Services, ConfigError>,
        http_client: reqwest::Client,
        redraw: RedrawHandle,
        metrics: Option<Metrics>,
    ) -> Self {
        if let Err(ref e) = services {
            warn!("Translation services unavailable, pages will report: {}", e);
        }
        Self {
            store,
            services,
            http_client,
            redraw,
            metrics,
        }
    }

    pub fn redraw(&self) -> &RedrawHandle {
        &self.redraw
    }

    /// Load a page if nobody has started it yet.
    ///
    /// Store failures are returned as errors; every other failure ends the
    /// page with `ok = false` and a message.
    pub async fn load(&self, page: &Page) -> StoreResult<LoadOutcome> {
        if !page.try_begin() {
            debug!("Page {} already {:?}, skipping", page.index(), page.status());
            return Ok(LoadOutcome::AlreadyStarted);
        }
        let ok = self.run(page).await?;
        Ok(LoadOutcome::Finished { ok })
    }

    /// Run the pipeline on a page the caller already claimed with `try_begin`.
    #[instrument(skip(self, page), fields(page = page.index(), source = %page.source()))]
    pub(crate) async fn run(&self, page: &Page) -> StoreResult<bool> {
        // Dropped last, after the final state is in place
        let _redraw = self.redraw.guard(page.index());
        let start = Instant::now();

        let result = self.process(page).await;
        let ok = match result {
            Ok(blocks) => {
                info!(
                    "Page {} done: {} blocks in {:.2}s",
                    page.index(),
                    blocks.len(),
                    start.elapsed().as_secs_f64()
                );
                page.finish_ok(blocks);
                true
            }
            Err(LoadFailure::Page(message)) => {
                warn!("Page {} failed: {}", page.index(), message);
                page.finish_err(message);
                false
            }
            Err(LoadFailure::Store(e)) => {
                error!("Page {} hit a result store failure: {}", page.index(), e);
                page.finish_err(e.to_string());
                if let Some(ref m) = self.metrics {
                    m.record_page_load(false, start.elapsed());
                }
                return Err(e);
            }
        };

        if let Some(ref m) = self.metrics {
            m.record_page_load(ok, start.elapsed());
        }
        Ok(ok)
    }

    async fn process(&self, page: &Page) -> Result<Vec<TextBlock>, LoadFailure> {
        let services = self
            .services
            .as_ref()
            .map_err(|e| LoadFailure::Page(e.to_string()))?;

        let image = load_image(page.source(), &self.http_client)
            .await
            .map_err(|e| LoadFailure::Page(e.to_string()))?;
        let hash = image.info.hash.clone();
        page.set_image(image.info.clone());
        debug!(
            "Loaded {}x{} image, xxh3:{}",
            image.info.width, image.info.height, hash
        );

        let service_id = services.settings.service_id();
        let blocks = match self.lookup(&hash, service_id).await? {
            // Already persisted under this key
            CacheMatch::Exact(blocks) => return Ok(blocks),
            CacheMatch::CrossService(mut blocks) => {
                page.set_progress(STATUS_TRANSLATING);
                self.translate_blocks(services, &mut blocks).await?;
                blocks
            }
            CacheMatch::Miss => {
                page.set_progress(STATUS_DETECTING);
                let mut blocks = self.recognize(services, &image.bytes).await?;
                page.set_progress(STATUS_TRANSLATING);
                self.translate_blocks(services, &mut blocks).await?;
                blocks
            }
        };

        self.insert(&hash, service_id, &blocks).await?;
        Ok(blocks)
    }

    async fn recognize(&self, services: &Services, image: &[u8]) -> Result<Vec<TextBlock>, LoadFailure> {
        let start = Instant::now();
        let result = services.recognizer.recognize(image).await;
        if let Some(ref m) = self.metrics {
            m.record_recognition_call(result.is_ok(), start.elapsed());
        }

        let regions = result.map_err(|e| LoadFailure::Page(e.to_string()))?;
        debug!("Recognized {} text regions", regions.len());
        Ok(TextBlock::from_regions(regions))
    }

    /// Translate every block in one batch, assigning results by position
    async fn translate_blocks(&self, services: &Services, blocks: &mut [TextBlock]) -> Result<(), LoadFailure> {
        if blocks.is_empty() {
            debug!("No text to translate");
            return Ok(());
        }

        let texts: Vec<String> = blocks.iter().map(|b| b.text.clone()).collect();
        let settings = &services.settings;

        let start = Instant::now();
        let result = services
            .translator
            .translate(
                &texts,
                settings.source_language.as_deref(),
                &settings.target_language,
            )
            .await
            .and_then(|translated| {
                if translated.len() != texts.len() {
                    return Err(TranslationError::LengthMismatch {
                        submitted: texts.len(),
                        returned: translated.len(),
                    });
                }
                Ok(translated)
            });
        if let Some(ref m) = self.metrics {
            m.record_translation_call(result.is_ok(), start.elapsed());
        }

        let translated = result.map_err(|e| LoadFailure::Page(e.to_string()))?;
        for (block, text) in blocks.iter_mut().zip(translated) {
            block.translated = text;
        }
        Ok(())
    }

    async fn lookup(&self, hash: &str, service_id: &str) -> StoreResult<CacheMatch> {
        let store = Arc::clone(&self.store);
        let hash = hash.to_string();
        let service_id = service_id.to_string();
        tokio::task::spawn_blocking(move || store.lookup(&hash, &service_id))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }

    async fn insert(&self, hash: &str, service_id: &str, blocks: &[TextBlock]) -> StoreResult<()> {
        let store = Arc::clone(&self.store);
        let hash = hash.to_string();
        let service_id = service_id.to_string();
        let blocks = blocks.to_vec();
        tokio::task::spawn_blocking(move || store.insert(&hash, &service_id, &blocks))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }
}
