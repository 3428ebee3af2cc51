use chrono::{DateTime, Utc};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::source::SourceKey;

/// Subdirectory holding downloaded source bodies and their metadata sidecars
const SOURCES_DIR: &str = "sources";

/// Log file written while the dashboard owns the terminal
pub const LOG_FILE: &str = "funnelboard.log";

/// True while `fetched_at` is younger than `ttl`. A zero TTL is never fresh.
pub fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    if ttl.is_zero() {
        return false;
    }
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now.signed_duration_since(fetched_at) < ttl,
        Err(_) => true,
    }
}

/// Manages cache directory and cache file operations
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

/// Sidecar stored next to a cached body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSourceMeta {
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CachedSource {
    pub meta: CachedSourceMeta,
    pub body: Vec<u8>,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Create a CacheManager with a custom cache directory (primarily for testing)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path to a specific cache file
    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn log_path(&self) -> PathBuf {
        self.cache_file(LOG_FILE)
    }

    /// Ensure the cache directory exists
    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    fn sources_dir(&self) -> PathBuf {
        self.cache_dir.join(SOURCES_DIR)
    }

    fn body_path(&self, key: &SourceKey) -> PathBuf {
        self.sources_dir().join(format!("{}.body", key.file_stem()))
    }

    fn meta_path(&self, key: &SourceKey) -> PathBuf {
        self.sources_dir().join(format!("{}.json", key.file_stem()))
    }

    /// Cached body for `key` when present and younger than `ttl`.
    /// Unreadable or mismatched entries are treated as missing.
    pub fn read_source(
        &self,
        key: &SourceKey,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedSource>> {
        let meta_path = self.meta_path(key);
        if !meta_path.exists() {
            return Ok(None);
        }
        let meta: CachedSourceMeta = match serde_json::from_str(&fs::read_to_string(&meta_path)?)
        {
            Ok(m) => m,
            Err(e) => {
                warn!(
                    path = %meta_path.display(),
                    error = %e,
                    "ignoring unreadable cache metadata"
                );
                return Ok(None);
            }
        };
        if meta.source != key.as_str() {
            debug!(cached = %meta.source, wanted = %key, "cache entry belongs to another source");
            return Ok(None);
        }
        if !is_fresh(meta.fetched_at, now, ttl) {
            debug!(source = %key, fetched_at = %meta.fetched_at, "cached source is stale");
            return Ok(None);
        }
        let body_path = self.body_path(key);
        let body = match fs::read(&body_path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if body.len() as u64 != meta.bytes {
            warn!(path = %body_path.display(), "cached body is truncated; refetching");
            return Ok(None);
        }
        info!(source = %key, fetched_at = %meta.fetched_at, "using cached source");
        Ok(Some(CachedSource { meta, body }))
    }

    /// Store `body` for `key`, replacing any previous entry.
    pub fn write_source(
        &self,
        key: &SourceKey,
        body: &[u8],
        fetched_at: DateTime<Utc>,
    ) -> Result<CachedSourceMeta> {
        fs::create_dir_all(self.sources_dir())?;
        let meta = CachedSourceMeta {
            source: key.as_str().to_string(),
            fetched_at,
            bytes: body.len() as u64,
        };
        fs::write(self.body_path(key), body)?;
        fs::write(self.meta_path(key), serde_json::to_string_pretty(&meta)?)?;
        debug!(source = %key, bytes = meta.bytes, "cached source");
        Ok(meta)
    }

    /// Remove the cached entry for `key`, if any.
    pub fn remove_source(&self, key: &SourceKey) -> Result<()> {
        for path in [self.body_path(key), self.meta_path(key)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Delete every cached source body. Returns how many entries were removed.
    pub fn clear_all(&self) -> Result<usize> {
        let dir = self.sources_dir();
        if !dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_meta = path.extension().is_some_and(|e| e == "json");
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "could not remove cache file");
            } else if is_meta {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

struct Entry<T> {
    value: T,
    fetched_at: DateTime<Utc>,
}

/// In-process cache of loaded datasets keyed by source, with a time-to-live.
pub struct DatasetCache<T> {
    ttl: Duration,
    entries: HashMap<SourceKey, Entry<T>>,
}

impl<T> DatasetCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fetched_at(&self, key: &SourceKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|e| e.fetched_at)
    }

    pub fn is_fresh_at(&self, key: &SourceKey, now: DateTime<Utc>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| is_fresh(e.fetched_at, now, self.ttl))
    }

    /// Fresh value for `key`, loading and storing it first when missing or stale.
    pub fn get_or_load<F>(&mut self, key: &SourceKey, load: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.get_or_load_at(key, Utc::now(), load)
    }

    pub fn get_or_load_at<F>(&mut self, key: &SourceKey, now: DateTime<Utc>, load: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if !self.is_fresh_at(key, now) {
            let value = load()?;
            self.entries.insert(
                key.clone(),
                Entry {
                    value,
                    fetched_at: now,
                },
            );
        }
        self.entries
            .get(key)
            .map(|e| &e.value)
            .ok_or_else(|| eyre!("dataset cache lost entry for {}", key))
    }

    pub fn invalidate(&mut self, key: &SourceKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_is_never_fresh() {
        let now = Utc::now();
        assert!(!is_fresh(now, now, Duration::ZERO));
        assert!(is_fresh(now, now, Duration::from_secs(1)));
    }

    #[test]
    fn age_at_ttl_is_stale() {
        let now = Utc::now();
        let then = now - chrono::Duration::seconds(60);
        assert!(!is_fresh(then, now, Duration::from_secs(60)));
        assert!(is_fresh(then, now, Duration::from_secs(61)));
    }
}
