//! # custos-review
//!
//! Audit log review, anomaly detection, and compliance reporting.
//!
//! The reviewer parses the raw audit log (structured JSON lines or the
//! pipe-delimited legacy format) within a time window, computes summary
//! statistics and security indicators, evaluates anomaly rules against
//! configurable thresholds, and renders text or JSON reports.

pub mod config;
pub mod report;
pub mod result;
pub mod reviewer;

pub use config::ReviewConfig;
pub use report::{export_report, generate_json_report, generate_report, ReportFormat};
pub use result::{Anomaly, AnomalyKind, ReviewResult, SecurityIndicators, Severity};
pub use reviewer::Reviewer;

// ── Tests ─────────────────────────────────────────────────────────────────────
