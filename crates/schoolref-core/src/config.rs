//! Client configuration.
//!
//! Settings are read from `~/.config/schoolref/config.json` when present and
//! can be overridden by `SCHOOLREF_*` environment variables. Nothing here is
//! written back by the cache; reference data is never persisted.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{CacheOptions, RetryPolicy};

/// Application name used for the config directory path
const APP_NAME: &str = "schoolref";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Rows requested per page. Reference collections are small, so one page
/// normally covers a whole collection.
const DEFAULT_PAGE_SIZE: u32 = 1000;

const DEFAULT_MAX_PAGES: u32 = 20;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_MAX_RETRY_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub request_timeout_secs: u64,
    /// Base delay after a failed fetch. `None` retries on every call.
    pub retry_backoff_ms: Option<u64>,
    pub max_retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_backoff_ms: None,
            max_retry_backoff_ms: DEFAULT_MAX_RETRY_BACKOFF_MS,
        }
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = raw, "Ignoring unparsable environment override");
            None
        }
    }
}

impl Config {
    /// Load the user config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply `SCHOOLREF_*` overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SCHOOLREF_API_URL") {
            self.api_base_url = url;
        }
        if let Some(v) = lookup("SCHOOLREF_PAGE_SIZE").and_then(|raw| parse_env("SCHOOLREF_PAGE_SIZE", &raw)) {
            self.page_size = v;
        }
        if let Some(v) = lookup("SCHOOLREF_MAX_PAGES").and_then(|raw| parse_env("SCHOOLREF_MAX_PAGES", &raw)) {
            self.max_pages = v;
        }
        if let Some(v) = lookup("SCHOOLREF_TIMEOUT_SECS").and_then(|raw| parse_env("SCHOOLREF_TIMEOUT_SECS", &raw)) {
            self.request_timeout_secs = v;
        }
        if let Some(raw) = lookup("SCHOOLREF_RETRY_BACKOFF_MS") {
            if raw.trim().is_empty() || raw.trim() == "0" {
                self.retry_backoff_ms = None;
            } else if let Some(v) = parse_env("SCHOOLREF_RETRY_BACKOFF_MS", &raw) {
                self.retry_backoff_ms = Some(v);
            }
        }
        if let Some(v) = lookup("SCHOOLREF_MAX_RETRY_BACKOFF_MS")
            .and_then(|raw| parse_env("SCHOOLREF_MAX_RETRY_BACKOFF_MS", &raw))
        {
            self.max_retry_backoff_ms = v;
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            page_size: self.page_size.max(1),
            max_pages: self.max_pages.max(1),
            retry: RetryPolicy {
                base: self.retry_backoff_ms.map(Duration::from_millis),
                max: Duration::from_millis(self.max_retry_backoff_ms),
            },
        }
    }
}
