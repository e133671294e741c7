pub mod page;
pub mod redraw;
pub mod sequence;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types
pub use page::{LoadOutcome, Page, PageLoader, PageState};
pub use redraw::{PipelineEvent, RedrawGuard, RedrawHandle, RedrawObserver};
pub use sequence::PageSequence;
