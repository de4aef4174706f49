// src/config.rs
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{IndexerError, Result};
use crate::notify::NotificationType;

pub const ENV_CONFIG_PATH: &str = "INDEXER_CONFIG_PATH";
pub const ENV_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ENV_SITEMAP: &str = "SITEMAP_FILE";
pub const ENV_INDEXED: &str = "INDEXED_FILE";
pub const ENV_SENT: &str = "SENT_FILE";
pub const ENV_RATE_LIMIT_DAY: &str = "RATE_LIMIT_PER_DAY";
pub const ENV_RATE_LIMIT_MINUTE: &str = "RATE_LIMIT_PER_MINUTE";
pub const ENV_NOTIFICATION_TYPE: &str = "NOTIFICATION_TYPE";
pub const ENV_INDEXING_ENDPOINT: &str = "INDEXING_ENDPOINT";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

pub const DEFAULT_DAILY_LIMIT: u32 = 200;
pub const DEFAULT_PER_MINUTE_LIMIT: u32 = 60;
pub const DEFAULT_INDEXING_ENDPOINT: &str =
    "https://indexing.googleapis.com/v3/urlNotifications:publish";

/// Process configuration, built once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    /// Service-account key; only the real notifier needs it.
    pub credentials_path: Option<PathBuf>,
    /// Local path or http(s) URL.
    pub sitemap_location: String,
    pub indexed_path: PathBuf,
    pub sent_path: PathBuf,
    pub daily_limit: u32,
    pub per_minute_limit: u32,
    pub notification_type: NotificationType,
    pub indexing_endpoint: String,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            sitemap_location: "sitemap.xml".to_string(),
            indexed_path: PathBuf::from("indexed.csv"),
            sent_path: PathBuf::from("sent.csv"),
            daily_limit: DEFAULT_DAILY_LIMIT,
            per_minute_limit: DEFAULT_PER_MINUTE_LIMIT,
            notification_type: NotificationType::UrlUpdated,
            indexing_endpoint: DEFAULT_INDEXING_ENDPOINT.to_string(),
            metrics_addr: None,
        }
    }
}

/// On-disk layout of the optional TOML file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    credentials: Option<PathBuf>,
    sitemap: Option<String>,
    indexed: Option<PathBuf>,
    sent: Option<PathBuf>,
    rate_limit_per_day: Option<i64>,
    rate_limit_per_minute: Option<i64>,
    notification_type: Option<String>,
    indexing_endpoint: Option<String>,
    metrics_addr: Option<String>,
}

impl IndexerConfig {
    /// Defaults, then `$INDEXER_CONFIG_PATH` (TOML) if set, then environment.
    /// `.env` is read first so local runs can keep settings there.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let file = read_file_config(Path::new(&p))?;
            cfg.apply_file(file)?;
        }
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Load from a TOML file only (no environment overrides).
    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_file(read_file_config(path)?)?;
        Ok(cfg)
    }

    fn apply_file(&mut self, f: FileConfig) -> Result<()> {
        if let Some(v) = f.credentials {
            self.credentials_path = Some(v);
        }
        if let Some(v) = f.sitemap {
            self.sitemap_location = v;
        }
        if let Some(v) = f.indexed {
            self.indexed_path = v;
        }
        if let Some(v) = f.sent {
            self.sent_path = v;
        }
        if let Some(v) = f.rate_limit_per_day {
            self.daily_limit = positive_limit("rate_limit_per_day", v)?;
        }
        if let Some(v) = f.rate_limit_per_minute {
            self.per_minute_limit = positive_limit("rate_limit_per_minute", v)?;
        }
        if let Some(v) = f.notification_type {
            self.notification_type = v.parse()?;
        }
        if let Some(v) = f.indexing_endpoint {
            self.indexing_endpoint = v;
        }
        if let Some(v) = f.metrics_addr {
            self.metrics_addr = Some(parse_addr("metrics_addr", &v)?);
        }
        Ok(())
    }

    /// Apply overrides from a variable lookup. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_CREDENTIALS) {
            self.credentials_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_SITEMAP) {
            self.sitemap_location = v;
        }
        if let Some(v) = get(ENV_INDEXED) {
            self.indexed_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_SENT) {
            self.sent_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_RATE_LIMIT_DAY) {
            self.daily_limit = parse_limit(ENV_RATE_LIMIT_DAY, &v)?;
        }
        if let Some(v) = get(ENV_RATE_LIMIT_MINUTE) {
            self.per_minute_limit = parse_limit(ENV_RATE_LIMIT_MINUTE, &v)?;
        }
        if let Some(v) = get(ENV_NOTIFICATION_TYPE) {
            self.notification_type = v.parse()?;
        }
        if let Some(v) = get(ENV_INDEXING_ENDPOINT) {
            self.indexing_endpoint = v;
        }
        if let Some(v) = get(ENV_METRICS_ADDR) {
            self.metrics_addr = Some(parse_addr(ENV_METRICS_ADDR, &v)?);
        }
        Ok(())
    }

    pub fn require_credentials(&self) -> Result<&Path> {
        self.credentials_path
            .as_deref()
            .ok_or_else(|| IndexerError::Config(format!("{ENV_CREDENTIALS} is not set")))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        IndexerError::Config(format!("reading config file {}: {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|e| {
        IndexerError::Config(format!("parsing config file {}: {e}", path.display()))
    })
}

fn parse_limit(name: &str, raw: &str) -> Result<u32> {
    let v: i64 = raw
        .trim()
        .parse()
        .map_err(|_| IndexerError::Config(format!("{name} must be an integer, got {raw:?}")))?;
    positive_limit(name, v)
}

fn positive_limit(name: &str, v: i64) -> Result<u32> {
    if v < 1 {
        return Err(IndexerError::Config(format!("{name} must be >= 1, got {v}")));
    }
    u32::try_from(v).map_err(|_| IndexerError::Config(format!("{name} is too large: {v}")))
}

fn parse_addr(name: &str, raw: &str) -> Result<SocketAddr> {
    raw.trim()
        .parse()
        .map_err(|_| IndexerError::Config(format!("{name} is not a socket address: {raw:?}")))
}
