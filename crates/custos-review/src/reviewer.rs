//! Audit log review and anomaly detection.
//!
//! The reviewer re-reads the raw log file independently of the ledger:
//! it parses structured (JSON) lines and the pipe-delimited legacy
//! format, skips anything unparseable, and computes statistics and
//! anomaly findings over the events inside the requested time window.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use tracing::debug;

use custos_contracts::{CustosError, CustosResult, Event, EventKind};

use crate::config::ReviewConfig;
use crate::result::{Anomaly, AnomalyKind, ReviewResult, SecurityIndicators, Severity};

/// Timestamp layout of the pipe-delimited legacy log format.
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Performs audit log review and analysis.
pub struct Reviewer {
    log_path: PathBuf,
    config: ReviewConfig,
}

impl Reviewer {
    pub fn new(log_path: impl Into<PathBuf>, config: ReviewConfig) -> Self {
        Self {
            log_path: log_path.into(),
            config,
        }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Review the configured analysis window, counted back from now.
    pub fn review(&self) -> CustosResult<ReviewResult> {
        let end = Utc::now();
        let start = end - chrono::Duration::hours(i64::from(self.config.analysis_window_hours));
        self.review_range(start, end)
    }

    /// Review a specific time range.
    pub fn review_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CustosResult<ReviewResult> {
        let events = self.parse_log(start, end)?;

        let mut result = ReviewResult {
            timestamp: Utc::now(),
            window_start: start,
            window_end: end,
            total_events: events.len(),
            query_count: 0,
            error_count: 0,
            success_rate: 0.0,
            total_tokens: 0,
            total_cost: 0.0,
            unique_session_count: 0,
            anomalies: Vec::new(),
            events_by_type: BTreeMap::new(),
            top_events: Vec::new(),
            security_indicators: SecurityIndicators::default(),
        };

        self.analyze(&events, &mut result);
        self.detect_anomalies(&events, &mut result);

        if self.config.include_queries && self.config.max_report_events > 0 {
            result.top_events = self.top_events(&events);
        }

        Ok(result)
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    /// Read the log line by line, keeping events inside `[start, end]`.
    /// Malformed lines are skipped — one corrupt line must not blind the
    /// review to the rest of the log.
    fn parse_log(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> CustosResult<Vec<Event>> {
        let contents = fs::read_to_string(&self.log_path).map_err(|e| CustosError::LogAccess {
            reason: format!(
                "failed to read audit log '{}': {}",
                self.log_path.display(),
                e
            ),
        })?;

        let mut events = Vec::new();
        let mut skipped = 0usize;

        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            let Some(event) = parse_line(line) else {
                skipped += 1;
                continue;
            };
            if event.timestamp < start || event.timestamp > end {
                continue;
            }
            events.push(event);
        }

        if skipped > 0 {
            debug!(skipped, "skipped unparseable audit log lines");
        }
        Ok(events)
    }

    // ── Analysis ──────────────────────────────────────────────────────────────

    /// Statistical pass: counters, aggregates, per-type histogram.
    fn analyze(&self, events: &[Event], result: &mut ReviewResult) {
        let mut sessions: BTreeSet<&str> = BTreeSet::new();
        let mut success_count = 0usize;

        for event in events {
            *result
                .events_by_type
                .entry(event.kind.as_tag().to_string())
                .or_default() += 1;

            if !event.session_id.is_empty() {
                sessions.insert(&event.session_id);
            }
            if event.kind == EventKind::Query {
                result.query_count += 1;
            }
            if event.success {
                success_count += 1;
            } else {
                result.error_count += 1;
            }
            result.total_tokens += event.tokens;
            result.total_cost += event.cost;
        }

        result.unique_session_count = sessions.len();
        if result.total_events > 0 {
            result.success_rate = success_count as f64 / result.total_events as f64 * 100.0;
        }
    }

    /// Rule pass: anomaly findings and security indicators.
    fn detect_anomalies(&self, events: &[Event], result: &mut ReviewResult) {
        let mut failed_auth = 0u64;
        let mut locked = 0u64;
        let mut unusual_hours = 0u64;
        let mut high_privilege = 0u64;
        let mut session_errors: BTreeMap<&str, u32> = BTreeMap::new();
        let mut last_security_event: Option<DateTime<Utc>> = None;

        for event in events {
            if event.kind.is_auth_related() && !event.success {
                failed_auth += 1;
                if failed_auth >= u64::from(self.config.failed_auth_threshold) {
                    result.anomalies.push(Anomaly {
                        kind: AnomalyKind::FailedAuthThreshold,
                        severity: Severity::High,
                        description: format!(
                            "failed authentication attempts exceeded threshold: {}",
                            failed_auth
                        ),
                        timestamp: Some(event.timestamp),
                        session_id: Some(event.session_id.clone()),
                        details: BTreeMap::new(),
                    });
                }
            }

            if !event.success {
                *session_errors.entry(&event.session_id).or_default() += 1;
            }

            if event.kind.is_lockout_related() {
                locked += 1;
                last_security_event = Some(event.timestamp);
            }

            if self.is_unusual_hour(event.timestamp.hour()) {
                unusual_hours += 1;
            }

            if event.kind.is_high_privilege() {
                high_privilege += 1;
                last_security_event = Some(event.timestamp);
            }

            if event.cost > self.config.high_cost_threshold {
                let mut details = BTreeMap::new();
                details.insert("cost".to_string(), format!("{:.2}", event.cost));
                details.insert("tokens".to_string(), event.tokens.to_string());
                result.anomalies.push(Anomaly {
                    kind: AnomalyKind::HighCostQuery,
                    severity: Severity::Medium,
                    description: format!("high cost query detected: ${:.2}", event.cost),
                    timestamp: Some(event.timestamp),
                    session_id: Some(event.session_id.clone()),
                    details,
                });
            }

            if event.tokens > self.config.high_token_threshold {
                result.anomalies.push(Anomaly {
                    kind: AnomalyKind::HighTokenUsage,
                    severity: Severity::Low,
                    description: format!("high token usage detected: {} tokens", event.tokens),
                    timestamp: Some(event.timestamp),
                    session_id: Some(event.session_id.clone()),
                    details: BTreeMap::new(),
                });
            }
        }

        for (session_id, errors) in &session_errors {
            if *errors >= self.config.error_rate_threshold {
                result.anomalies.push(Anomaly {
                    kind: AnomalyKind::HighSessionErrors,
                    severity: Severity::Medium,
                    description: format!("session has a high error count: {} errors", errors),
                    timestamp: None,
                    session_id: Some((*session_id).to_string()),
                    details: BTreeMap::new(),
                });
            }
        }

        if unusual_hours > u64::from(self.config.unusual_hours_threshold) {
            result.anomalies.push(Anomaly {
                kind: AnomalyKind::UnusualHoursActivity,
                severity: Severity::Medium,
                description: format!(
                    "significant activity during unusual hours: {} events",
                    unusual_hours
                ),
                timestamp: None,
                session_id: None,
                details: BTreeMap::new(),
            });
        }

        result.security_indicators = SecurityIndicators {
            failed_auth_count: failed_auth,
            locked_account_count: locked,
            unusual_hours_activity: unusual_hours,
            high_privilege_ops: high_privilege,
            last_security_event,
        };
    }

    /// True when `hour` falls inside the configured unusual-hours window,
    /// wrapping past midnight when the start hour is after the end hour.
    fn is_unusual_hour(&self, hour: u32) -> bool {
        let start = self.config.unusual_hours_start;
        let end = self.config.unusual_hours_end;
        if start > end {
            hour >= start || hour < end
        } else {
            hour >= start && hour < end
        }
    }

    /// The highest-cost events, capped at `max_report_events`.
    fn top_events(&self, events: &[Event]) -> Vec<Event> {
        let mut sorted = events.to_vec();
        sorted.sort_by(|a, b| b.cost.total_cmp(&a.cost));
        sorted.truncate(self.config.max_report_events);
        sorted
    }
}

// ── Line parsing ──────────────────────────────────────────────────────────────

/// Parse one log line, structured or legacy. `None` for unparseable input.
pub(crate) fn parse_line(line: &str) -> Option<Event> {
    if line.starts_with('{') {
        if let Ok(event) = serde_json::from_str::<Event>(line) {
            return Some(event);
        }
    }
    parse_legacy_line(line)
}

/// Parse the pipe-delimited legacy format:
/// `timestamp | kind | session | tier | "query" | tokens | cost | status`
/// where `status` is `SUCCESS` or `ERROR: <message>`. Only the first four
/// fields are mandatory.
fn parse_legacy_line(line: &str) -> Option<Event> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.len() < 4 {
        return None;
    }

    let timestamp = NaiveDateTime::parse_from_str(parts[0], LEGACY_TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();

    let mut event = Event::new(EventKind::from(parts[1]), parts[2]).at(timestamp);
    if !parts[3].is_empty() {
        event.tier = Some(parts[3].to_string());
    }
    if let Some(query) = parts.get(4) {
        let query = query.trim_matches('"');
        if !query.is_empty() {
            event.query = Some(query.to_string());
        }
    }
    if let Some(tokens) = parts.get(5) {
        event.tokens = tokens.parse().unwrap_or(0);
    }
    if let Some(cost) = parts.get(6) {
        event.cost = cost.parse().unwrap_or(0.0);
    }
    if let Some(status) = parts.get(7) {
        event.success = status.starts_with("SUCCESS");
        if let Some(message) = status.strip_prefix("ERROR:") {
            event.error = Some(message.trim().to_string());
        }
    }

    Some(event)
}

impl std::fmt::Debug for Reviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reviewer")
            .field("log_path", &self.log_path)
            .finish_non_exhaustive()
    }
}
