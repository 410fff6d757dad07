//! Report rendering and export.
//!
//! Pure formatting over an already-computed `ReviewResult` — nothing here
//! re-reads the audit log.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use custos_contracts::{CustosError, CustosResult};

use crate::result::ReviewResult;

/// Output format for exported reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unsupported report format '{}'", other)),
        }
    }
}

/// Render the fixed-width text report.
pub fn generate_report(result: &ReviewResult) -> String {
    let bar = "=".repeat(80);
    let mut out = String::new();

    out.push_str(&bar);
    out.push_str("\n                          AUDIT REVIEW REPORT\n");
    out.push_str(&bar);
    out.push_str("\n\n");

    out.push_str(&format!(
        "Report Generated: {}\n",
        result.timestamp.to_rfc3339()
    ));
    out.push_str(&format!(
        "Analysis Window:  {} to {}\n\n",
        result.window_start.to_rfc3339(),
        result.window_end.to_rfc3339()
    ));

    out.push_str("SUMMARY\n-------\n");
    out.push_str(&format!("Total Events:      {}\n", result.total_events));
    out.push_str(&format!("Query Count:       {}\n", result.query_count));
    out.push_str(&format!("Error Count:       {}\n", result.error_count));
    out.push_str(&format!("Success Rate:      {:.1}%\n", result.success_rate));
    out.push_str(&format!("Total Tokens:      {}\n", result.total_tokens));
    out.push_str(&format!("Total Cost:        ${:.4}\n", result.total_cost));
    out.push_str(&format!(
        "Unique Sessions:   {}\n\n",
        result.unique_session_count
    ));

    let indicators = &result.security_indicators;
    out.push_str("SECURITY INDICATORS\n-------------------\n");
    out.push_str(&format!(
        "Failed Auth Attempts:    {}\n",
        indicators.failed_auth_count
    ));
    out.push_str(&format!(
        "Locked Accounts:         {}\n",
        indicators.locked_account_count
    ));
    out.push_str(&format!(
        "Unusual Hours Activity:  {}\n",
        indicators.unusual_hours_activity
    ));
    out.push_str(&format!(
        "High Privilege Ops:      {}\n",
        indicators.high_privilege_ops
    ));
    if let Some(last) = indicators.last_security_event {
        out.push_str(&format!("Last Security Event:     {}\n", last.to_rfc3339()));
    }
    out.push('\n');

    if !result.anomalies.is_empty() {
        out.push_str("ANOMALIES DETECTED\n------------------\n");
        for anomaly in &result.anomalies {
            out.push_str(&format!(
                "[{}] {}: {}\n",
                anomaly.severity.to_string().to_uppercase(),
                anomaly.kind,
                anomaly.description
            ));
            if let Some(session) = &anomaly.session_id {
                out.push_str(&format!("         Session: {}\n", session));
            }
            if let Some(timestamp) = anomaly.timestamp {
                out.push_str(&format!("         Time: {}\n", timestamp.to_rfc3339()));
            }
        }
        out.push('\n');
    }

    out.push_str("EVENTS BY TYPE\n--------------\n");
    for (kind, count) in &result.events_by_type {
        out.push_str(&format!("{:<25} {}\n", kind, count));
    }
    out.push('\n');

    out.push_str(&bar);
    out.push_str("\n                              END OF REPORT\n");
    out.push_str(&bar);
    out.push('\n');

    out
}

/// Render the pretty-printed JSON report.
pub fn generate_json_report(result: &ReviewResult) -> CustosResult<String> {
    serde_json::to_string_pretty(result).map_err(|e| CustosError::Serialization {
        reason: format!("failed to serialize review result: {}", e),
    })
}

/// Write the report to `output_path`, creating parent directories with
/// owner-only access and the file itself with owner-only permissions.
pub fn export_report(
    result: &ReviewResult,
    output_path: &Path,
    format: ReportFormat,
) -> CustosResult<()> {
    let content = match format {
        ReportFormat::Text => generate_report(result),
        ReportFormat::Json => generate_json_report(result)?,
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CustosError::Config {
            reason: format!(
                "failed to create report directory '{}': {}",
                parent.display(),
                e
            ),
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                CustosError::Config {
                    reason: format!("failed to restrict report directory: {}", e),
                }
            })?;
        }
    }

    write_restricted(output_path, content.as_bytes()).map_err(|e| CustosError::Config {
        reason: format!(
            "failed to write report '{}': {}",
            output_path.display(),
            e
        ),
    })
}

#[cfg(unix)]
fn write_restricted(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_restricted(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}
