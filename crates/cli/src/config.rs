//! Configuration management for the CLI
//!
//! Values come from, in increasing priority:
//! - built-in defaults
//! - `~/.config/gtop/config.json`, when present
//! - `GTOP_*` environment variables (e.g. `GTOP_PROMETHEUS_URL`)
//!
//! Command-line flags override the result.

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cluster display name attached to log events
    pub cluster_name: String,
    /// Prometheus base URL; discovered in-cluster when unset
    pub prometheus_url: Option<String>,
    pub prometheus_namespace: String,
    pub prometheus_service: String,
    pub prometheus_port: u16,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
    pub default_format: Option<OutputFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_name: "default".to_string(),
            prometheus_url: None,
            prometheus_namespace: "monitoring".to_string(),
            prometheus_service: "prometheus-operated".to_string(),
            prometheus_port: 9090,
            request_timeout_secs: 30,
            default_format: None,
        }
    }
}

impl Config {
    /// Load configuration from the user config file and environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path().as_deref())
    }

    /// Load configuration from an explicit file (if any) and environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("GTOP").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("gtop").join("config.json"))
    }
}
