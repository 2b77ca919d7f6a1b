//! Render cache.
//!
//! Final render output is memoized under a key derived from the template
//! name and the effective render context. Storage sits behind the
//! [`CacheStore`] trait:
//!
//! - [`MemoryCacheStore`] - In-process map, safe for concurrent renders
//! - [`FileCacheStore`] - One file per entry in a cache directory
//!
//! Entries never expire and are never invalidated: a changed context yields
//! a new key, but editing a template under an unchanged name keeps serving
//! the old output until the store is cleared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use sha2::{Digest, Sha256};
use sigil_core::error::{SigilError, SigilResult};
use tracing::{debug, warn};

use crate::context::{Context, Value};

/// Byte storage for rendered output.
///
/// Implementations must tolerate concurrent `get`/`put` calls. Entries are
/// immutable once written, so two racing renders writing the same key is
/// harmless.
pub trait CacheStore: Send + Sync {
    /// Gets the entry stored under `key`.
    fn get(&self, key: &str) -> SigilResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn put(&self, key: &str, value: &[u8]) -> SigilResult<()>;
}

/// Computes the cache key for rendering `name` against `ctx`.
///
/// The key is the lowercase SHA-256 hex digest of the name, a NUL separator
/// and the context serialized as JSON.
///
/// JSON has no NaN or infinity, so a context holding a non-finite float
/// cannot be keyed and returns `SerializationError`.
pub fn cache_key(name: &str, ctx: &Context) -> SigilResult<String> {
    if let Some((path, f)) = non_finite_float(ctx) {
        return Err(SigilError::SerializationError(format!(
            "Cannot serialize context: '{path}' holds non-finite float {f}"
        )));
    }
    let payload = serde_json::to_vec(ctx)
        .map_err(|e| SigilError::SerializationError(format!("Cannot serialize context: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(&payload);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Finds the first float in `ctx` that JSON would write as `null`.
fn non_finite_float(ctx: &Context) -> Option<(String, f64)> {
    fn walk(path: String, value: &Value) -> Option<(String, f64)> {
        match value {
            Value::Float(f) if !f.is_finite() => Some((path, *f)),
            Value::List(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| walk(format!("{path}.{i}"), item)),
            Value::Object(inner) => inner
                .iter()
                .find_map(|(k, v)| walk(format!("{path}.{k}"), v)),
            _ => None,
        }
    }
    ctx.iter().find_map(|(k, v)| walk(k.clone(), v))
}

// ============================================================
// MemoryCacheStore
// ============================================================

/// An in-memory cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> SigilResult<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> SigilResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

// ============================================================
// FileCacheStore
// ============================================================

/// A cache store that keeps each entry in `<dir>/<key>.cache`.
///
/// Writes go to a temporary file that is renamed into place, so readers
/// never observe a partially written entry.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

impl FileCacheStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the filesystem path for a given cache key.
    fn key_path(&self, key: &str) -> PathBuf {
        let safe = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if safe {
            self.dir.join(format!("{key}.cache"))
        } else {
            self.dir
                .join(format!("{:x}.cache", Sha256::digest(key.as_bytes())))
        }
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> SigilResult<Option<Vec<u8>>> {
        match std::fs::read(self.key_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SigilError::CacheError(format!(
                "Failed to read cache entry '{key}': {e}"
            ))),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> SigilResult<()> {
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&self.dir)?;
            let path = self.key_path(key);
            let tmp = path.with_extension(format!(
                "{}.{}.tmp",
                std::process::id(),
                TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
            ));
            std::fs::write(&tmp, value)?;
            std::fs::rename(&tmp, &path).inspect_err(|_| {
                let _ = std::fs::remove_file(&tmp);
            })
        };
        write().map_err(|e| {
            SigilError::CacheError(format!("Failed to write cache entry '{key}': {e}"))
        })
    }
}

// ============================================================
// RenderCache
// ============================================================

/// The engine's view of a cache store: failures are logged, never raised.
#[derive(Clone)]
pub struct RenderCache {
    store: Arc<dyn CacheStore>,
}

impl RenderCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Returns the cached output for `key`. Store errors count as a miss.
    pub fn lookup(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(content) => {
                    debug!(key, "Render cache hit");
                    Some(content)
                }
                Err(e) => {
                    warn!(key, error = %e, "Ignoring non-UTF-8 cache entry");
                    None
                }
            },
            Ok(None) => {
                debug!(key, "Render cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Cache lookup failed; rendering");
                None
            }
        }
    }

    /// Stores rendered output. Store errors are logged and dropped.
    pub fn store(&self, key: &str, content: &str) {
        if let Err(e) = self.store.put(key, content.as_bytes()) {
            warn!(key, error = %e, "Cache store failed; output not cached");
        }
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache").finish_non_exhaustive()
    }
}
