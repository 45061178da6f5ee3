//! Runtime configuration: defaults, then an optional JSON file, then
//! `RENTALA_*` environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::DEFAULT_CACHE_PREFIX;
use crate::store::StoreOptions;
use crate::view::DEFAULT_PAGE_SIZE;
use crate::{AppError, AppResult};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CACHE_DB_FILE_NAME: &str = "cache.sqlite3";
const APP_DIR_NAME: &str = "rentala";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub api_base: String,
    pub api_token: Option<String>,
    pub cache_prefix: String,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub page_size: usize,
    pub seed_examples: bool,
    pub snapshot_on_mutation: bool,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3000".into(),
            api_token: None,
            cache_prefix: DEFAULT_CACHE_PREFIX.into(),
            cache_ttl_secs: 60 * 60,
            request_timeout_secs: 10,
            page_size: DEFAULT_PAGE_SIZE,
            seed_examples: false,
            snapshot_on_mutation: true,
            data_dir: None,
        }
    }
}

// Tokens stay out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_base", &self.api_base)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("cache_prefix", &self.cache_prefix)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("page_size", &self.page_size)
            .field("seed_examples", &self.seed_examples)
            .field("snapshot_on_mutation", &self.snapshot_on_mutation)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl Config {
    /// Reads `path` if given, else `<data dir>/config.json` when it exists,
    /// then applies the process environment.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_data_dir().join(CONFIG_FILE_NAME);
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        info!(
            target: "rentala",
            event = "config_loaded",
            api_base = %config.api_base,
            data_dir = %config.data_dir().display(),
            has_token = config.api_token.is_some()
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG/READ", "Failed to read configuration file")
                .with_context("path", path.display().to_string())
                .with_cause(e)
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::new("CONFIG/PARSE", "Configuration file is not valid JSON")
                .with_context("path", path.display().to_string())
                .with_cause(e)
        })
    }

    /// Overrides fields from `RENTALA_*` variables supplied by `lookup`.
    pub fn apply_env<L>(&mut self, lookup: L) -> AppResult<()>
    where
        L: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base) = text("RENTALA_API_BASE") {
            self.api_base = base;
        }
        if let Some(token) = text("RENTALA_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(prefix) = text("RENTALA_CACHE_PREFIX") {
            self.cache_prefix = prefix;
        }
        if let Some(dir) = text("RENTALA_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = text("RENTALA_CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_env("RENTALA_CACHE_TTL_SECS", &raw)?;
        }
        if let Some(raw) = text("RENTALA_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("RENTALA_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = text("RENTALA_PAGE_SIZE") {
            self.page_size = parse_env("RENTALA_PAGE_SIZE", &raw)?;
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir().join(CACHE_DB_FILE_NAME)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            cache_ttl_ms: i64::try_from(self.cache_ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
            seed_examples: self.seed_examples,
            snapshot_on_mutation: self.snapshot_on_mutation,
        }
    }

    /// `0` disables pagination.
    pub fn page_size(&self) -> Option<usize> {
        (self.page_size > 0).then_some(self.page_size)
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim().parse().map_err(|_| {
        AppError::new("CONFIG/INVALID_ENV", format!("{key} has an invalid value"))
            .with_context("key", key)
            .with_context("value", raw)
    })
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}
