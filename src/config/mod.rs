use anyhow::{Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::models::Configuration;

/// Top-level configuration for the guide collector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Guide sources, one backend each
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

/// HTTP settings shared by every backend
///
/// These are the deadlines applied to all backend I/O; they are handed to
/// providers through the client rather than through the provider contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total request timeout
    #[serde(default = "default_http_timeout", with = "duration_serde::duration")]
    pub timeout: Duration,
    /// TCP/TLS connect timeout
    #[serde(
        default = "default_http_connect_timeout",
        with = "duration_serde::duration"
    )]
    pub connect_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Where and how the combined XMLTV document is written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output file; `-` writes to stdout
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    /// Value of the `generator-info-name` attribute
    #[serde(default = "default_generator_name")]
    pub generator_name: String,
}

/// A named provider configuration as it appears in the config file
///
/// `Configuration` never serializes its label, so the file-level name lives
/// here and is copied in by [`ProviderEntry::to_configuration`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub settings: Configuration,
}

impl ProviderEntry {
    pub fn to_configuration(&self) -> Configuration {
        Configuration {
            name: self.name.clone(),
            ..self.settings.clone()
        }
    }
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
}

fn default_http_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HTTP_CONNECT_TIMEOUT_SECS)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_generator_name() -> String {
    DEFAULT_GENERATOR_NAME.to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            connect_timeout: default_http_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            generator_name: default_generator_name(),
        }
    }
}

impl Config {
    /// Layer defaults, the TOML file (if present) and `GUIDE_PROVIDERS_*`
    /// environment overrides, in that order.
    pub fn load_from_file(config_file: impl AsRef<Path>) -> Result<Self> {
        let path = config_file.as_ref();
        if !path.exists() {
            warn!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        info!(
            "Loaded configuration with {} guide provider(s)",
            config.providers.len()
        );
        Ok(config)
    }

    /// Reject settings that would make provider output ambiguous
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.providers {
            if entry.name.is_empty() {
                continue;
            }
            if !seen.insert(entry.name.as_str()) {
                bail!("Duplicate provider name '{}' in configuration", entry.name);
            }
        }

        if self.http.timeout.is_zero() {
            bail!("http.timeout must be greater than zero");
        }

        Ok(())
    }

    /// Provider configurations with their labels applied
    pub fn provider_configurations(&self) -> Vec<Configuration> {
        self.providers
            .iter()
            .map(ProviderEntry::to_configuration)
            .collect()
    }
}
