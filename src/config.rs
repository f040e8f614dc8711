use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::BsError;

pub const DEFAULT_API_URL: &str = "https://api.basespace.illumina.com/v1pre3";
pub const CONFIG_FILE_NAME: &str = "basespace-download.json";

/// On-disk configuration. The app token is deliberately not part of it.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub page_limit: Option<u32>,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub max_retries: Option<usize>,
    pub output_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_url: String,
    /// Whole-request deadline. `None` lets long transfers run to completion.
    pub timeout: Option<Duration>,
    pub max_retries: usize,
    pub page_limit: Option<u32>,
    pub output_dir: Utf8PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
            max_retries: 0,
            page_limit: None,
            output_dir: Utf8PathBuf::from("."),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit `path` must exist; the default location is optional.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, BsError> {
        let config = match path {
            Some(path) => Self::load(PathBuf::from(path))?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::load(path)?,
                _ => Config::default(),
            },
        };
        Self::resolve_config(config, overrides)
    }

    pub fn load(path: PathBuf) -> Result<Config, BsError> {
        let content = fs::read_to_string(&path).map_err(|_| BsError::ConfigRead(path.clone()))?;
        serde_json::from_str(&content).map_err(|err| BsError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, BsError> {
        let defaults = ResolvedConfig::default();

        let api_url = overrides
            .api_url
            .or(config.api_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        if !(api_url.starts_with("https://") || api_url.starts_with("http://")) {
            return Err(BsError::ConfigParse(format!(
                "api_url must be an http(s) URL, got {api_url:?}"
            )));
        }

        let timeout = match config.timeout_secs {
            Some(0) => {
                return Err(BsError::ConfigParse(
                    "timeout_secs must be greater than zero".to_string(),
                ));
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.timeout,
        };

        if config.page_limit == Some(0) {
            return Err(BsError::ConfigParse(
                "page_limit must be greater than zero".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            api_url,
            timeout,
            max_retries: overrides
                .max_retries
                .or(config.max_retries)
                .unwrap_or(defaults.max_retries),
            page_limit: config.page_limit,
            output_dir: overrides
                .output_dir
                .or(config.output_dir)
                .unwrap_or(defaults.output_dir),
        })
    }

    pub fn default_config_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}
