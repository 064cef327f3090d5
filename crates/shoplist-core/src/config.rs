//! Application configuration management.
//!
//! This module handles loading and saving the configuration of the offline
//! cache: the origin it serves, where the worker script lives, and the
//! version tag that names the current cache store.
//!
//! Configuration is stored at `~/.config/shoplist/config.json`. A few
//! environment variables override individual fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::offline::{cache_name, seeds, CacheSettings};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shoplist";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Subdirectory of the cache directory holding the cache stores
const STORES_DIR: &str = "stores";

/// Bump whenever seed contents or caching policy change, so that old stores
/// are evicted on the next activation.
pub const CACHE_VERSION: &str = "v2";

pub const CACHE_PREFIX: &str = "new-year-shopping-list";

const ENV_ORIGIN: &str = "SHOPLIST_ORIGIN";
const ENV_VERSION: &str = "SHOPLIST_VERSION";
const ENV_CACHE_DIR: &str = "SHOPLIST_CACHE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: String,
    /// Path of the worker script on the origin; its directory is the base path
    pub script_path: String,
    pub cache_prefix: String,
    pub version: String,
    pub seed_paths: Vec<String>,
    /// No deadline when unset
    pub fetch_timeout_secs: Option<u64>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_string(),
            script_path: "/sw.js".to_string(),
            cache_prefix: CACHE_PREFIX.to_string(),
            version: CACHE_VERSION.to_string(),
            seed_paths: seeds::DEFAULT_SEED_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            fetch_timeout_secs: None,
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults when absent), then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(origin) = var(ENV_ORIGIN) {
            self.origin = origin;
        }
        if let Some(version) = var(ENV_VERSION) {
            self.version = version;
        }
        if let Some(dir) = var(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn stores_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(STORES_DIR))
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin: {}", self.origin))
    }

    pub fn cache_settings(&self) -> Result<CacheSettings> {
        let origin = self.origin_url()?;
        let base = seeds::base_path(&self.script_path);
        let seed_urls = seeds::seed_urls(&origin, &base, &self.seed_paths)
            .context("Invalid seed path")?;
        Ok(CacheSettings {
            origin,
            cache_name: cache_name(&self.cache_prefix, &self.version),
            seed_urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_cache_settings() {
        let settings = Config::default().cache_settings().unwrap();
        assert_eq!(settings.cache_name, "new-year-shopping-list-v2");
        let urls: Vec<&str> = settings.seed_urls.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:5173/",
                "http://localhost:5173/menu",
                "http://localhost:5173/index.html",
                "http://localhost:5173/manifest.json",
            ]
        );
    }

    #[test]
    fn test_settings_under_subdirectory() {
        let config = Config {
            origin: "https://example.github.io".to_string(),
            script_path: "/shopping-list/sw.js".to_string(),
            ..Config::default()
        };
        let settings = config.cache_settings().unwrap();
        assert_eq!(settings.seed_urls[1].as_str(), "https://example.github.io/shopping-list/menu");
    }

    #[test]
    fn test_invalid_origin() {
        let config = Config {
            origin: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.cache_settings().is_err());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.version, CACHE_VERSION);
        assert!(config.fetch_timeout().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            version: "v7".to_string(),
            fetch_timeout_secs: Some(10),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.version, "v7");
        assert_eq!(loaded.fetch_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"origin": "https://shop.example"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.origin, "https://shop.example");
        assert_eq!(config.cache_prefix, CACHE_PREFIX);
        assert_eq!(config.seed_paths.len(), 4);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_ORIGIN, "https://shop.example"),
            (ENV_VERSION, "v3"),
            (ENV_CACHE_DIR, "/tmp/shoplist-test"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.origin, "https://shop.example");
        assert_eq!(config.version, "v3");
        assert_eq!(
            config.stores_dir().unwrap(),
            PathBuf::from("/tmp/shoplist-test").join("stores")
        );
    }
}
