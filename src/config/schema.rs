use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::context::UNIT_LIST_PAGE;
use crate::pricing::BatchOptions;

/// Main configuration.
///
/// Example YAML:
/// ```yaml
/// tenant_id: "4521"
/// units_file: ~/units.json
/// api:
///   base_url: https://example.test/api/v1
///   timeout: 30s
/// pricing:
///   max_concurrent_updates: 4
///   update_timeout: 1m
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Company the listing belongs to; first segment of every storage key
    pub tenant_id: String,

    #[serde(default = "default_page_type")]
    pub page_type: String,

    /// Units response to read instead of fetching from the API
    #[serde(default)]
    pub units_file: Option<PathBuf>,

    /// Settings store file (default: platform data dir)
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub pricing: PricingConfig,
}

fn default_page_type() -> String {
    UNIT_LIST_PAGE.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,

    /// Sent as a bearer token when present
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout, humantime format (e.g. "30s")
    #[serde(default)]
    pub timeout: Option<String>,

    /// Attempts per request (default: 3)
    #[serde(default)]
    pub retries: Option<usize>,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout
            .as_deref()
            .and_then(|t| humantime::parse_duration(t).ok())
    }

    pub fn attempts(&self) -> usize {
        self.retries.unwrap_or(3).max(1)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Upper bound on concurrent price updates (default: 8)
    #[serde(default)]
    pub max_concurrent_updates: Option<usize>,

    /// Per-unit update deadline, humantime format; unset means no deadline
    #[serde(default)]
    pub update_timeout: Option<String>,
}

impl PricingConfig {
    pub fn batch_options(&self) -> BatchOptions {
        let defaults = BatchOptions::default();
        BatchOptions {
            max_concurrent: self
                .max_concurrent_updates
                .unwrap_or(defaults.max_concurrent),
            update_timeout: self
                .update_timeout
                .as_deref()
                .and_then(|t| humantime::parse_duration(t).ok()),
        }
    }
}
