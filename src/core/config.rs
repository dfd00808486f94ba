use crate::core::catalog::DEFAULT_TTL_HOURS;
use crate::core::fanout::DEFAULT_MAX_CONCURRENCY;
use crate::providers::eastmoney::{
    DEFAULT_CATALOG_URL, DEFAULT_DETAIL_BASE_URL, DEFAULT_QUOTE_BASE_URL,
};
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

const MAX_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EastmoneyProviderConfig {
    pub catalog_url: String,
    pub quote_base_url: String,
    pub detail_base_url: String,
}

impl Default for EastmoneyProviderConfig {
    fn default() -> Self {
        EastmoneyProviderConfig {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            quote_base_url: DEFAULT_QUOTE_BASE_URL.to_string(),
            detail_base_url: DEFAULT_DETAIL_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub eastmoney: EastmoneyProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 10,
            retries: 2,
            retry_delay_ms: 300,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Upper bound on quote requests in flight for one query.
    pub max_concurrency: usize,
    pub cache_ttl_hours: i64,
    /// Serve an expired catalog when refreshing it fails.
    pub serve_stale_on_error: bool,
    /// Also match queries against pinyin abbreviations.
    pub match_aliases: bool,
}

impl SearchConfig {
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours.clamp(1, MAX_TTL_HOURS))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cache_ttl_hours: DEFAULT_TTL_HOURS,
            serve_stale_on_error: false,
            match_aliases: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults when it
    /// does not exist.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "fundwatch", "fundwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("com", "fundwatch", "fundwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ttl = self.search.cache_ttl_hours;
        if !(1..=MAX_TTL_HOURS).contains(&ttl) {
            bail!("search.cache_ttl_hours must be between 1 and {MAX_TTL_HOURS}, got {ttl}");
        }
        Ok(())
    }
}
