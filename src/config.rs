use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{DiscoveryStrategy, PrimarySite};
use crate::error::GdcError;
use crate::http::HttpSettings;
use crate::rate_limit::RateLimitSettings;

pub const DEFAULT_CONFIG_FILE: &str = "gdc-fm.json";
pub const DEFAULT_BASE_URL: &str = "https://api.gdc.cancer.gov";
pub const DEFAULT_PRIMARY_SITE: &str = "Breast";
pub const DEFAULT_TOP_N_GENES: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_MAX_RETRIES: usize = 5;

/// Settings file as written by the user. Every field is optional.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub primary_site: Option<String>,
    #[serde(default)]
    pub top_n_genes: Option<usize>,
    #[serde(default)]
    pub min_affected_pct: Option<f64>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub retry_base_delay_ms: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub strategy: Option<DiscoveryStrategy>,
    #[serde(default)]
    pub census_file: Option<String>,
    #[serde(default)]
    pub gene_limit: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub max_requests: Option<usize>,
    #[serde(default)]
    pub window_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub primary_site: PrimarySite,
    pub top_n_genes: usize,
    pub min_affected_pct: f64,
    pub output_dir: Utf8PathBuf,
    pub http: HttpSettings,
    pub strategy: DiscoveryStrategy,
    pub census_file: Option<Utf8PathBuf>,
    pub gene_limit: Option<usize>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the settings file. The default file may be absent; an explicit path must exist.
    pub fn load(path: Option<&str>) -> Result<Config, GdcError> {
        let config_path = Utf8PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));

        if path.is_none() && !config_path.as_std_path().exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| GdcError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| GdcError::ConfigParse(err.to_string()))
    }

    pub fn resolve(path: Option<&str>) -> Result<Settings, GdcError> {
        Self::resolve_config(Self::load(path)?)
    }

    pub fn resolve_config(config: Config) -> Result<Settings, GdcError> {
        let primary_site = config
            .primary_site
            .as_deref()
            .unwrap_or(DEFAULT_PRIMARY_SITE)
            .parse()?;

        let top_n_genes = config.top_n_genes.unwrap_or(DEFAULT_TOP_N_GENES);
        if top_n_genes == 0 {
            return Err(GdcError::ConfigParse(
                "top_n_genes must be at least 1".to_string(),
            ));
        }

        let min_affected_pct = config.min_affected_pct.unwrap_or(0.0);
        if !min_affected_pct.is_finite() || min_affected_pct < 0.0 {
            return Err(GdcError::ConfigParse(format!(
                "min_affected_pct must be a non-negative number, got {min_affected_pct}"
            )));
        }

        let page_size = config.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(GdcError::ConfigParse(
                "page_size must be at least 1".to_string(),
            ));
        }

        let rate_limit = config.rate_limit.unwrap_or_default();
        let max_requests = rate_limit.max_requests.unwrap_or(5);
        let window_secs = rate_limit.window_secs.unwrap_or(1.0);
        if max_requests == 0 {
            return Err(GdcError::ConfigParse(
                "rate_limit.max_requests must be at least 1".to_string(),
            ));
        }
        if !window_secs.is_finite() || window_secs <= 0.0 {
            return Err(GdcError::ConfigParse(format!(
                "rate_limit.window_secs must be positive, got {window_secs}"
            )));
        }

        let http = HttpSettings {
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            rate_limit: RateLimitSettings {
                max_requests,
                window: Duration::from_secs_f64(window_secs),
            },
            page_size,
            max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms.unwrap_or(1000)),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(60)),
        };

        Ok(Settings {
            primary_site,
            top_n_genes,
            min_affected_pct,
            output_dir: Utf8PathBuf::from(config.output_dir.unwrap_or_else(|| ".".to_string())),
            http,
            strategy: config.strategy.unwrap_or_default(),
            census_file: config.census_file.map(Utf8PathBuf::from),
            gene_limit: config.gene_limit,
        })
    }
}
