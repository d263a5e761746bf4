//! File system helpers shared by the cache and the system environment.

use crate::constants::BINARY_SNIFF_LEN;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Creates a directory and all of its parents if they don't exist.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Writes `content` to `path` atomically.
///
/// The bytes go to a sibling temporary file which is then renamed over the
/// target, so readers see either the old file or the complete new one.
/// Parent directories are created automatically.
pub async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    temp_name.push(format!(".{}.{seq}.tmp", std::process::id()));
    let temp_path = path.with_file_name(temp_name);

    tokio::fs::write(&temp_path, content)
        .await
        .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e)
            .with_context(|| format!("Failed to rename temp file to: {}", path.display()));
    }

    Ok(())
}

/// Whether `bytes` look binary: a NUL byte within the first sniff window.
#[must_use]
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_atomic_write_creates_parents() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("a/b/c.txt");

        atomic_write(&target, b"hello").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&target).await.unwrap(), "hello");

        atomic_write(&target, b"replaced").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&target).await.unwrap(), "replaced");

        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_looks_binary() {
        assert!(!looks_binary(b"plain text\n"));
        assert!(looks_binary(b"PNG\0\x01"));

        let mut late_nul = vec![b'a'; BINARY_SNIFF_LEN];
        late_nul.push(0);
        assert!(!looks_binary(&late_nul));
    }
}
