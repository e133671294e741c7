use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_128;

use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::ImageInfo;

/// Where a page image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(String),
}

impl ImageSource {
    /// Treat http(s) arguments as URLs and everything else as a file path.
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            ImageSource::Url(arg.to_string())
        } else {
            ImageSource::Path(PathBuf::from(arg))
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => write!(f, "{}", path.display()),
            ImageSource::Url(url) => f.write_str(url),
        }
    }
}

/// Raw bytes of a page image plus its hash and dimensions
#[derive(Clone)]
pub struct LoadedImage {
    pub bytes: Arc<Vec<u8>>,
    pub info: ImageInfo,
}

/// Content hash of image bytes: xxHash3-128 as 32 lowercase hex chars.
///
/// Depends only on the bytes, so two paths to identical files share a key.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:032x}", xxh3_128(bytes))
}

/// Read a page image from disk or the network, hash it and read its dimensions.
pub async fn load_image(source: &ImageSource, http: &reqwest::Client) -> PipelineResult<LoadedImage> {
    let source_name = source.to_string();

    let bytes = match source {
        ImageSource::Path(path) => {
            tokio::fs::read(path)
                .await
                .map_err(|e| PipelineError::ImageLoad {
                    source_name: source_name.clone(),
                    reason: e.to_string(),
                })?
        }
        ImageSource::Url(url) => fetch_bytes(http, url).await.map_err(|e| PipelineError::ImageLoad {
            source_name: source_name.clone(),
            reason: e.to_string(),
        })?,
    };

    let bytes = Arc::new(bytes);
    let (hash, (width, height)) = hash_and_measure_async(Arc::clone(&bytes), source_name).await?;

    Ok(LoadedImage {
        bytes,
        info: ImageInfo { hash, width, height },
    })
}

async fn fetch_bytes(http: &reqwest::Client, url: &str) -> reqwest::Result<Vec<u8>> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Hash the bytes and decode the image header on the blocking pool.
async fn hash_and_measure_async(
    bytes: Arc<Vec<u8>>,
    source_name: String,
) -> PipelineResult<(String, (u32, u32))> {
    let task_name = source_name.clone();
    tokio::task::spawn_blocking(move || {
        let hash = content_hash(&bytes);
        let dimensions = image::ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| PipelineError::ImageLoad {
                source_name: source_name.clone(),
                reason: e.to_string(),
            })?
            .into_dimensions()
            .map_err(|source| PipelineError::ImageDecode {
                source_name,
                source,
            })?;
        Ok((hash, dimensions))
    })
    .await
    .map_err(|e| PipelineError::ImageLoad {
        source_name: task_name,
        reason: format!("image task failed: {}", e),
    })?
}
