// Ordered page sequence with a cursor and look-ahead prefetch

use std::sync::Arc;
use tracing::{debug, error, info};

use super::page::{Page, PageLoader};
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::PageSnapshot;
use crate::utils::ImageSource;

/// Pages in reading order plus the cursor the viewer is on.
///
/// Moving forward schedules the current page and up to `window` pages after
/// it; moving back never schedules anything. Scheduling claims the page
/// synchronously, so a page is never loaded twice no matter how often the
/// cursor passes over it.
pub struct PageSequence {
    pages: Vec<Arc<Page>>,
    cursor: usize,
    window: usize,
    loader: Arc<PageLoader>,
}

impl PageSequence {
    /// Build the sequence and schedule the initial window.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(sources: Vec<ImageSource>, loader: Arc<PageLoader>, window: usize) -> PipelineResult<Self> {
        if sources.is_empty() {
            return Err(PipelineError::EmptySequence);
        }

        let pages = sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| Arc::new(Page::new(index, source)))
            .collect::<Vec<_>>();
        info!("Page sequence: {} pages, prefetch window {}", pages.len(), window);

        let sequence = Self {
            pages,
            cursor: 0,
            window,
            loader,
        };
        sequence.schedule_window();
        Ok(sequence)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn current(&self) -> &Arc<Page> {
        &self.pages[self.cursor]
    }

    pub fn page(&self, index: usize) -> Option<&Arc<Page>> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[Arc<Page>] {
        &self.pages
    }

    /// Move to the next page and schedule the window ahead of it.
    /// Returns false at the last page.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 >= self.pages.len() {
            return false;
        }
        self.cursor += 1;
        debug!("Cursor -> {}", self.cursor);
        self.schedule_window();
        true
    }

    /// Move to the previous page. Returns false at the first page.
    pub fn retreat(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        debug!("Cursor -> {}", self.cursor);
        true
    }

    pub fn snapshots(&self) -> Vec<PageSnapshot> {
        self.pages.iter().map(|p| p.snapshot()).collect()
    }

    fn schedule_window(&self) {
        let last = (self.cursor + self.window).min(self.pages.len() - 1);
        for page in &self.pages[self.cursor..=last] {
            self.schedule(page);
        }
    }

    fn schedule(&self, page: &Arc<Page>) {
        if !page.try_begin() {
            return;
        }
        debug!("Scheduling page {}", page.index());

        let page = Arc::clone(page);
        let loader = Arc::clone(&self.loader);
        tokio::spawn(async move {
            if let Err(e) = loader.run(&page).await {
                error!("Stopping: result store failed on page {}", page.index());
                loader.redraw().report_store_failure(page.index(), e.to_string());
            }
        });
    }
}
