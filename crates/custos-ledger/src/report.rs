//! Structured verification output.
//!
//! Integrity and tamper findings are data, not errors: the hosting
//! application decides policy (block, warn, alert) from these reports, the
//! ledger never decides for it.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of walking the chain (or the witness file) and re-deriving every
/// check. `valid` is true exactly when `issues` is empty.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityCheck {
    pub valid: bool,
    pub issues: Vec<String>,
}

impl IntegrityCheck {
    /// A passing check with no findings.
    pub fn ok() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
        }
    }

    /// Build a check whose validity follows from its issue list.
    pub fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Full tamper-detection report: chain verification plus file-level checks.
///
/// `verified` reflects chain and witness findings. Permission issues and
/// timestamp anomalies are surfaced separately — they are suspicious
/// circumstances rather than proof the recorded history changed.
#[derive(Debug, Clone, Serialize)]
pub struct TamperReport {
    pub timestamp: DateTime<Utc>,
    pub verified: bool,
    pub chain_length: usize,
    pub issues: Vec<String>,
    pub permission_issues: Vec<String>,
    pub timestamp_anomalies: Vec<String>,
}
