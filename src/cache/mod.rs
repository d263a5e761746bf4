//! Persistent cache for URL imports.
//!
//! Each fetched URL is stored as two co-located files named by the SHA-256
//! of the URL:
//!
//! ```text
//! ~/.mdimport/cache/urls/
//! ├── 3f5a...e1.content      # fetched body
//! └── 3f5a...e1.meta.json    # CacheMetadata
//! ```
//!
//! The content file is written before the metadata file, so the presence of
//! metadata implies a complete body. Both writes go through a temp file and
//! a rename. Concurrent writers to the same key are last-writer-wins, which
//! is fine since every entry can be fetched again.
//!
//! A lookup past the entry's TTL is a miss, but the stale body and
//! validators (`ETag`, `Last-Modified`) are still returned so the caller can
//! revalidate with a conditional request and [`ContentCache::touch`] the
//! entry on `304 Not Modified`.
//!
//! Unreadable or corrupt metadata is treated as a miss. Nothing is evicted
//! in the background; use [`ContentCache::sweep_expired`] or
//! [`ContentCache::clear`].

use crate::tokens::estimate_tokens;
use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONTENT_EXT: &str = "content";
const METADATA_SUFFIX: &str = ".meta.json";

/// Metadata stored next to each cached body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// The cached URL
    pub url: String,
    /// When the body was last fetched or revalidated
    pub fetched_at: DateTime<Utc>,
    /// Time to live in seconds
    pub ttl_secs: u64,
    /// `ETag` validator from the last response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// `Last-Modified` validator from the last response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Declared content type of the body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Estimated token count of the body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
}

impl CacheMetadata {
    /// Whether the entry is older than its TTL at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(Duration::from_secs(self.ttl_secs))
            .is_ok_and(|ttl| now.signed_duration_since(self.fetched_at) > ttl)
    }
}

/// Response details recorded alongside a body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryInfo {
    /// `ETag` header
    pub etag: Option<String>,
    /// `Last-Modified` header
    pub last_modified: Option<String>,
    /// `Content-Type` header
    pub content_type: Option<String>,
}

/// Result of a cache lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheLookup {
    /// Fresh entry found; `content` can be used as is
    pub hit: bool,
    /// An entry exists but is past its TTL
    pub expired: bool,
    /// Stored body, fresh or stale
    pub content: Option<String>,
    /// Stored metadata, fresh or stale
    pub metadata: Option<CacheMetadata>,
}

impl CacheLookup {
    /// A lookup that found nothing usable.
    #[must_use]
    pub fn miss() -> Self {
        Self::default()
    }
}

/// File-backed URL content cache.
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
    default_ttl: Duration,
}

impl ContentCache {
    /// Cache rooted at `dir`, with `default_ttl` for new entries.
    #[must_use]
    pub const fn new(dir: PathBuf, default_ttl: Duration) -> Self {
        Self {
            dir,
            default_ttl,
        }
    }

    /// Cache in the per-user cache directory (`<cache_dir>/urls`).
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be determined.
    pub fn open_default(default_ttl: Duration) -> Result<Self> {
        let dir = crate::config::get_cache_dir()?.join("urls");
        Ok(Self::new(dir, default_ttl))
    }

    /// Directory holding the cache artifacts.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// TTL given to entries stored without an explicit one.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Hex SHA-256 of `url`, used to name its artifacts.
    #[must_use]
    pub fn key(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    fn content_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{CONTENT_EXT}"))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{METADATA_SUFFIX}"))
    }

    /// Look up `url` now.
    pub async fn get(&self, url: &str) -> CacheLookup {
        self.get_at(url, Utc::now()).await
    }

    /// Look up `url`, or report a miss without reading when `bypass` is set.
    pub async fn lookup(&self, url: &str, bypass: bool) -> CacheLookup {
        if bypass {
            tracing::debug!(target: "cache", "Bypassing cache for {url}");
            return CacheLookup::miss();
        }
        self.get(url).await
    }

    /// Look up `url` as of `now`.
    pub async fn get_at(&self, url: &str, now: DateTime<Utc>) -> CacheLookup {
        let key = Self::key(url);
        let Some(metadata) = self.read_metadata(&key).await else {
            return CacheLookup::miss();
        };

        let content_path = self.content_path(&key);
        let content = match tokio::fs::read_to_string(&content_path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    target: "cache",
                    "Cached body missing for {url} at {}: {e}",
                    content_path.display()
                );
                return CacheLookup::miss();
            }
        };

        let expired = metadata.is_expired_at(now);
        tracing::trace!(target: "cache", "Cache {} for {url}", if expired { "stale" } else { "hit" });
        CacheLookup {
            hit: !expired,
            expired,
            content: Some(content),
            metadata: Some(metadata),
        }
    }

    async fn read_metadata(&self, key: &str) -> Option<CacheMetadata> {
        let path = self.metadata_path(key);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(target: "cache", "Failed to read {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(target: "cache", "Ignoring corrupt cache metadata {}: {e}", path.display());
                None
            }
        }
    }

    async fn write_metadata(&self, key: &str, metadata: &CacheMetadata) -> Result<()> {
        let json = serde_json::to_vec_pretty(metadata).context("Failed to serialize cache metadata")?;
        atomic_write(&self.metadata_path(key), &json).await
    }

    /// Store `content` for `url`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if either artifact cannot be written.
    pub async fn set(
        &self,
        url: &str,
        content: &str,
        info: EntryInfo,
        ttl: Option<Duration>,
    ) -> Result<CacheMetadata> {
        self.set_at(url, content, info, ttl, Utc::now()).await
    }

    async fn set_at(
        &self,
        url: &str,
        content: &str,
        info: EntryInfo,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<CacheMetadata> {
        let key = Self::key(url);
        let metadata = CacheMetadata {
            url: url.to_string(),
            fetched_at: now,
            ttl_secs: ttl.unwrap_or(self.default_ttl).as_secs(),
            etag: info.etag,
            last_modified: info.last_modified,
            content_type: info.content_type,
            token_count: Some(estimate_tokens(content)),
        };

        atomic_write(&self.content_path(&key), content.as_bytes()).await?;
        self.write_metadata(&key, &metadata).await?;
        tracing::debug!(target: "cache", "Cached {url} ({} bytes)", content.len());
        Ok(metadata)
    }

    /// Refresh `fetched_at` (and any new validators) after `304 Not Modified`.
    ///
    /// Returns `false` when there is no entry to refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be rewritten.
    pub async fn touch(
        &self,
        url: &str,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> Result<bool> {
        let key = Self::key(url);
        let Some(mut metadata) = self.read_metadata(&key).await else {
            return Ok(false);
        };

        metadata.fetched_at = Utc::now();
        if etag.is_some() {
            metadata.etag = etag;
        }
        if last_modified.is_some() {
            metadata.last_modified = last_modified;
        }
        self.write_metadata(&key, &metadata).await?;
        tracing::debug!(target: "cache", "Revalidated {url}");
        Ok(true)
    }

    /// Remove the entry for `url`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if an artifact exists but cannot be removed.
    pub async fn invalidate(&self, url: &str) -> Result<bool> {
        self.remove_key(&Self::key(url)).await
    }

    async fn remove_key(&self, key: &str) -> Result<bool> {
        let mut removed = false;
        // Metadata first so a half-removed entry reads as a miss.
        for path in [self.metadata_path(key), self.content_path(key)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
                }
            }
        }
        Ok(removed)
    }

    /// Remove every entry past its TTL, plus unreadable ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be listed or an entry
    /// cannot be removed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.sweep_expired_at(Utc::now()).await
    }

    async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for key in self.keys().await? {
            let expired = self.read_metadata(&key).await.is_none_or(|m| m.is_expired_at(now));
            if expired && self.remove_key(&key).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(target: "cache", "Swept {removed} expired cache entries");
        }
        Ok(removed)
    }

    /// Remove every entry. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be listed or an entry
    /// cannot be removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.keys().await? {
            if self.remove_key(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Keys of every entry with at least one artifact on disk.
    async fn keys(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read cache directory: {}", self.dir.display())
                });
            }
        };

        let mut keys = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.context("Failed to read cache directory entry")?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = name
                .strip_suffix(METADATA_SUFFIX)
                .or_else(|| name.strip_suffix(&format!(".{CONTENT_EXT}")));
            if let Some(key) = key.filter(|key| !keys.iter().any(|k: &String| k == *key)) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }
}
