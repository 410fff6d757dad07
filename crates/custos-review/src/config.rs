//! Review thresholds and configuration.
//!
//! `ReviewConfig` is deserialized from TOML (or built with `Default`) and
//! holds every threshold the anomaly rules consult. All fields have
//! defaults, so a partial TOML document only overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use custos_contracts::{CustosError, CustosResult};

/// Thresholds and settings for audit log review.
///
/// Example in TOML:
/// ```toml
/// failed_auth_threshold = 5
/// unusual_hours_start = 23
/// unusual_hours_end = 5
/// high_cost_threshold = 2.5
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Window used by `Reviewer::review`, counted back from now.
    pub analysis_window_hours: u32,

    /// Failed authentication attempts in the window that raise a
    /// high-severity anomaly.
    pub failed_auth_threshold: u32,

    /// Errors attributed to a single session that raise a medium anomaly.
    pub error_rate_threshold: u32,

    /// Start hour (0-23) of the unusual-hours window.
    pub unusual_hours_start: u32,

    /// End hour (0-23, exclusive) of the unusual-hours window. A start
    /// after the end wraps past midnight, e.g. 22 → 6.
    pub unusual_hours_end: u32,

    /// Unusual-hours events in the window that raise a medium anomaly.
    pub unusual_hours_threshold: u32,

    /// Per-event cost above which a medium anomaly is raised.
    pub high_cost_threshold: f64,

    /// Per-event token count above which a low anomaly is raised.
    pub high_token_threshold: u64,

    /// Include the highest-cost events in the report. Off by default so
    /// reports never carry query text unless asked.
    pub include_queries: bool,

    /// Cap on the number of events included when `include_queries` is on.
    pub max_report_events: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            analysis_window_hours: 24,
            failed_auth_threshold: 3,
            error_rate_threshold: 10,
            unusual_hours_start: 22,
            unusual_hours_end: 6,
            unusual_hours_threshold: 10,
            high_cost_threshold: 10.0,
            high_token_threshold: 10_000,
            include_queries: false,
            max_report_events: 1000,
        }
    }
}

impl ReviewConfig {
    /// Parse `s` as TOML review configuration.
    pub fn from_toml_str(s: &str) -> CustosResult<Self> {
        toml::from_str(s).map_err(|e| CustosError::Config {
            reason: format!("failed to parse review config TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML review configuration.
    pub fn from_file(path: &Path) -> CustosResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CustosError::Config {
            reason: format!("failed to read review config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
