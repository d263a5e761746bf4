//! Environment-variable overrides for configuration and cache location.
//!
//! These tests mutate process environment variables, so they run serially.

use mdimport::cache::ContentCache;
use mdimport::config::{GlobalConfig, get_cache_dir};
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;

struct EnvGuard(&'static str);

impl EnvGuard {
    fn set(key: &'static str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        // SAFETY: tests touching the environment are marked #[serial].
        unsafe { std::env::set_var(key, value) };
        Self(key)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see `EnvGuard::set`.
        unsafe { std::env::remove_var(self.0) };
    }
}

#[tokio::test]
#[serial]
async fn test_config_path_override() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("custom.toml");
    std::fs::write(&path, "max_parallel = 2\ncache_ttl_secs = 5\n").unwrap();
    let _guard = EnvGuard::set("MDIMPORT_CONFIG_PATH", &path);

    assert_eq!(GlobalConfig::default_path().unwrap(), path);
    let config = GlobalConfig::load().await.unwrap();
    assert_eq!(config.max_parallel, 2);
    assert_eq!(config.cache_ttl(), Duration::from_secs(5));
}

#[tokio::test]
#[serial]
async fn test_explicit_path_beats_env() {
    let temp = TempDir::new().unwrap();
    let from_env = temp.path().join("env.toml");
    let explicit = temp.path().join("explicit.toml");
    std::fs::write(&from_env, "max_parallel = 2\n").unwrap();
    std::fs::write(&explicit, "max_parallel = 7\n").unwrap();
    let _guard = EnvGuard::set("MDIMPORT_CONFIG_PATH", &from_env);

    let config = GlobalConfig::load_with_optional(Some(explicit)).await.unwrap();
    assert_eq!(config.max_parallel, 7);
}

#[tokio::test]
#[serial]
async fn test_cache_dir_override_is_created() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("cache");
    let _guard = EnvGuard::set("MDIMPORT_CACHE_DIR", &dir);

    assert_eq!(get_cache_dir().unwrap(), dir);
    assert!(dir.is_dir());

    let cache = ContentCache::open_default(Duration::from_secs(60)).unwrap();
    assert_eq!(cache.cache_dir(), dir.join("urls"));
}
