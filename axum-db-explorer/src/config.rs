//! Explorer configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the explorer router and its adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExplorerConfig {
    /// URL path the explorer is mounted at (e.g. "/db-explorer")
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Rows per page when the request does not ask for a limit
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Upper bound for the `limit` parameter of row queries
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    /// Largest result set a raw query may return
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: u64,

    /// Per-statement timeout in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_base_path() -> String {
    "/db-explorer".to_string()
}

fn default_page_size() -> u64 {
    100
}

fn default_max_page_size() -> u64 {
    500
}

fn default_max_result_rows() -> u64 {
    10_000
}

fn default_query_timeout() -> u64 {
    30
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_result_rows: default_max_result_rows(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

impl ExplorerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mount path.
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Limits handed to the database adapters
    pub fn query_limits(&self) -> QueryLimits {
        QueryLimits {
            timeout: Duration::from_secs(self.query_timeout_secs),
            max_result_rows: self.max_result_rows,
        }
    }

    /// Clamp a requested page size
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

/// Execution limits enforced by the adapters
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub timeout: Duration,
    pub max_result_rows: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        ExplorerConfig::default().query_limits()
    }
}
