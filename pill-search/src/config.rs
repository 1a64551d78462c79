//! Service configuration
//!
//! Tuning constants for query boosts and the rank filter, plus the server
//! settings. Every value has a default; a TOML file and `PILL_*`
//! environment variables may override any of them.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of results when a request does not ask for one
pub const DEFAULT_TOP_K: usize = 8;

/// Largest `top_k` accepted by the HTTP API
pub const MAX_TOP_K: usize = 20;

/// Clause boosts used when building imprint queries.
///
/// The empirical defaults keep exact keyword hits (10) above fuzzy text
/// hits (5) on the same field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoostConfig {
    /// Exact match on the print keyword fields
    pub exact: f32,
    /// Approximate match on the print text fields
    pub fuzzy: f32,
    /// Mark-code field match when the imprint is a mark reference
    pub mark_code_for_mark: f32,
    /// Mark-code field match for plain printed text
    pub mark_code_for_print: f32,
    /// Exact match of a variation, mark reference
    pub variation_exact_for_mark: f32,
    /// Exact match of a variation, plain printed text
    pub variation_exact_for_print: f32,
    /// Mark-code match of a variation, mark reference
    pub variation_mark_code_for_mark: f32,
    /// Mark-code match of a variation, plain printed text
    pub variation_mark_code_for_print: f32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            exact: 10.0,
            fuzzy: 5.0,
            mark_code_for_mark: 8.0,
            mark_code_for_print: 4.0,
            variation_exact_for_mark: 8.0,
            variation_exact_for_print: 5.0,
            variation_mark_code_for_mark: 6.0,
            variation_mark_code_for_print: 3.0,
        }
    }
}

/// Parameters of the adaptive result cutoff
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RankConfig {
    /// Never return fewer hits than this (when available)
    pub min_results: usize,
    /// Relative drop between neighbours, as a fraction of the top score,
    /// that counts as a natural break
    pub gap_ratio_threshold: f32,
    /// Hits scoring below this fraction of the top score are dropped
    pub absolute_ratio_threshold: f32,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            min_results: 1,
            gap_ratio_threshold: 0.15,
            absolute_ratio_threshold: 0.5,
        }
    }
}

/// Settings consumed by the search pipeline
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    pub boosts: BoostConfig,
    pub ranking: RankConfig,
}

/// Which engine executes the built queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded Tantivy index under `data_dir`
    Local,
    /// Remote Elasticsearch cluster
    Elastic,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    pub data_dir: String,
    pub elastic_url: String,
    pub elastic_index: String,
    pub default_top_k: usize,
    pub search: SearchSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            backend: BackendKind::Local,
            data_dir: "./data".to_string(),
            elastic_url: "http://localhost:9200".to_string(),
            elastic_index: "pills".to_string(),
            default_top_k: DEFAULT_TOP_K,
            search: SearchSettings::default(),
        }
    }
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load the service configuration.
///
/// Sources, lowest precedence first: built-in defaults, the optional TOML
/// file at `path`, then `PILL_` environment variables where `__` separates
/// nested keys (e.g. `PILL_SEARCH__RANKING__MIN_RESULTS=2`).
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("PILL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
