use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::errors::{StoreError, StoreResult};
use crate::core::types::TextBlock;
use crate::utils::Metrics;

/// File name of the result store inside the cache directory
pub const CACHE_FILE_NAME: &str = "mtl-cache.json";

/// On-disk format version
const STORE_VERSION: u32 = 1;

/// One cached result: recognized blocks of an image, translated by one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub image_hash: String,
    pub service_id: String,
    pub blocks: Vec<TextBlock>,
}

/// Serialized form of the whole store
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntries {
    version: u32,
    entries: Vec<CacheEntry>,
}

impl StoredEntries {
    fn empty() -> Self {
        Self {
            version: STORE_VERSION,
            entries: Vec::new(),
        }
    }
}

/// Outcome of a store lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMatch {
    /// Cached for this image and this service; nothing left to do
    Exact(Vec<TextBlock>),
    /// Recognized before under another service; translations are cleared
    CrossService(Vec<TextBlock>),
    /// Never seen this image
    Miss,
}

impl CacheMatch {
    pub fn label(&self) -> &'static str {
        match self {
            CacheMatch::Exact(_) => "exact",
            CacheMatch::CrossService(_) => "cross_service",
            CacheMatch::Miss => "miss",
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub size_bytes: u64,
}

/// Durable (image hash, service id) -> text blocks store.
///
/// Every operation re-reads the whole file, and every insert rewrites it
/// through a temp file + rename so the file always holds a complete encoding.
/// All access is serialized through one lock owned by the store, so share a
/// single instance (behind `Arc`) per backing file.
pub struct ResultStore {
    path: PathBuf,
    lock: Mutex<()>,
    metrics: Option<Metrics>,
}

impl ResultStore {
    /// Open the store in `cache_dir`, creating the directory and an empty
    /// store file if needed, and validating an existing one.
    pub fn open(cache_dir: impl AsRef<Path>, metrics: Option<Metrics>) -> StoreResult<Self> {
        let cache_dir = cache_dir.as_ref();
        std::fs::create_dir_all(cache_dir).map_err(|source| StoreError::Io {
            path: cache_dir.to_path_buf(),
            source,
        })?;

        let store = Self {
            path: cache_dir.join(CACHE_FILE_NAME),
            lock: Mutex::new(()),
            metrics,
        };

        // Surface corruption now instead of on the first page
        let entries = {
            let _guard = store.lock.lock();
            store.read_locked()?
        };
        if let Some(ref m) = store.metrics {
            m.update_cache_size(entries.len());
        }
        info!(
            "Result store ready at {} ({} entries)",
            store.path.display(),
            entries.len()
        );

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the blocks for an image under a translation service.
    pub fn lookup(&self, image_hash: &str, service_id: &str) -> StoreResult<CacheMatch> {
        let entries = {
            let _guard = self.lock.lock();
            self.read_locked()?
        };

        let found = find_match(entries, image_hash, service_id);
        debug!(
            "Cache lookup xxh3:{} service:{} -> {}",
            image_hash,
            service_id,
            found.label()
        );
        match &found {
            CacheMatch::Exact(_) => {
                info!("Image found in cache, skipping API requests");
                if let Some(ref m) = self.metrics {
                    m.record_cache_hit();
                }
            }
            CacheMatch::CrossService(_) => {
                info!("Image text found in cache, performing new translation requests");
                if let Some(ref m) = self.metrics {
                    m.record_cross_service_hit();
                }
            }
            CacheMatch::Miss => {
                info!("Image not found in cache, performing API requests");
                if let Some(ref m) = self.metrics {
                    m.record_cache_miss();
                }
            }
        }

        Ok(found)
    }

    /// Insert or replace the entry for (image hash, service id).
    pub fn insert(&self, image_hash: &str, service_id: &str, blocks: &[TextBlock]) -> StoreResult<()> {
        debug!("Adding image to cache. xxh3:{} service:{}", image_hash, service_id);

        let _guard = self.lock.lock();
        let mut entries = self.read_locked()?;

        let entry = CacheEntry {
            image_hash: image_hash.to_string(),
            service_id: service_id.to_string(),
            blocks: blocks.to_vec(),
        };

        match entries
            .iter_mut()
            .find(|e| e.image_hash == image_hash && e.service_id == service_id)
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }

        self.write_locked(&entries)?;

        if let Some(ref m) = self.metrics {
            m.update_cache_size(entries.len());
        }
        Ok(())
    }

    /// Every entry currently persisted, in file order
    pub fn entries(&self) -> StoreResult<Vec<CacheEntry>> {
        let _guard = self.lock.lock();
        self.read_locked()
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let _guard = self.lock.lock();
        let entries = self.read_locked()?.len();
        let size_bytes = std::fs::metadata(&self.path)
            .map_err(|source| self.io_error(source))?
            .len();
        Ok(StoreStats { entries, size_bytes })
    }

    /// Decode the whole file, bootstrapping an empty one if it does not exist.
    /// Caller must hold `self.lock`.
    fn read_locked(&self) -> StoreResult<Vec<CacheEntry>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Creating empty result store at {}", self.path.display());
                self.write_locked(&[])?;
                return Ok(Vec::new());
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let stored: StoredEntries =
            serde_json::from_slice(&data).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if stored.version != STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                found: stored.version,
                expected: STORE_VERSION,
            });
        }

        Ok(stored.entries)
    }

    /// Encode all entries and atomically replace the backing file.
    /// Caller must hold `self.lock`.
    fn write_locked(&self, entries: &[CacheEntry]) -> StoreResult<()> {
        let stored = StoredEntries {
            entries: entries.to_vec(),
            ..StoredEntries::empty()
        };
        let json = serde_json::to_vec(&stored).map_err(StoreError::Encode)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| self.io_error(source))?;
        tmp.write_all(&json).map_err(|source| self.io_error(source))?;
        tmp.as_file()
            .sync_all()
            .map_err(|source| self.io_error(source))?;
        tmp.persist(&self.path).map_err(|e| StoreError::Replace {
            path: self.path.clone(),
            source: e.error,
        })?;

        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Exact match wins; otherwise the most recent entry for the same image
/// under any other service is reused with its translations cleared.
fn find_match(entries: Vec<CacheEntry>, image_hash: &str, service_id: &str) -> CacheMatch {
    let mut other_service = None;

    for entry in entries {
        if entry.image_hash != image_hash {
            continue;
        }
        if entry.service_id == service_id {
            return CacheMatch::Exact(entry.blocks);
        }
        other_service = Some(entry.blocks);
    }

    match other_service {
        Some(mut blocks) => {
            for block in &mut blocks {
                block.translated.clear();
            }
            CacheMatch::CrossService(blocks)
        }
        None => CacheMatch::Miss,
    }
}
