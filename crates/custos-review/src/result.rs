//! Review output types.
//!
//! A `ReviewResult` is derived and disposable: computed fresh on every
//! review call, never persisted by the reviewer itself.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custos_contracts::Event;

/// Severity of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// The closed set of anomaly classifications the rules can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    FailedAuthThreshold,
    HighSessionErrors,
    HighCostQuery,
    HighTokenUsage,
    UnusualHoursActivity,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnomalyKind::FailedAuthThreshold => "FAILED_AUTH_THRESHOLD",
            AnomalyKind::HighSessionErrors => "HIGH_SESSION_ERRORS",
            AnomalyKind::HighCostQuery => "HIGH_COST_QUERY",
            AnomalyKind::HighTokenUsage => "HIGH_TOKEN_USAGE",
            AnomalyKind::UnusualHoursActivity => "UNUSUAL_HOURS_ACTIVITY",
        };
        f.write_str(name)
    }
}

/// One detected anomaly, attributed to a session and point in time where
/// the rule provides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

/// Security-relevant counters accumulated over the review window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityIndicators {
    pub failed_auth_count: u64,
    pub locked_account_count: u64,
    pub unusual_hours_activity: u64,
    pub high_privilege_ops: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_security_event: Option<DateTime<Utc>>,
}

/// The full result of one review pass over the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub timestamp: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,

    pub total_events: usize,
    pub query_count: usize,
    pub error_count: usize,
    pub success_rate: f64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub unique_session_count: usize,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<Anomaly>,

    /// Event counts keyed by wire tag, in stable (sorted) order.
    pub events_by_type: BTreeMap<String, u64>,

    /// Highest-cost events, present only when queries were requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_events: Vec<Event>,

    pub security_indicators: SecurityIndicators,
}
