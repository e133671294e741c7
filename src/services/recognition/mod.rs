pub mod vision;

use async_trait::async_trait;

use crate::core::errors::RecognitionResult;
use crate::core::types::RecognizedRegion;

pub use vision::VisionRecognizer;

/// Text recognition boundary.
///
/// Returns regions in reading order; that order fixes block colors and the
/// translation batch order for the rest of the pipeline.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> RecognitionResult<Vec<RecognizedRegion>>;
}
