//! Audited event model.
//!
//! `Event` is the atomic unit of audit data, produced by the external logger
//! and consumed read-only by the protector (for signing) and the reviewer
//! (for analysis). Events are immutable once constructed — the audit trail
//! is append-only, so there is no mutation API.
//!
//! The JSON field names (`event_type`, `cost_cents`, …) match the on-disk
//! log format exactly, so events round-trip through log lines written by
//! the logger without translation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Event kind ────────────────────────────────────────────────────────────────

/// The closed set of audited event kinds.
///
/// The on-disk log format carries a free-form string tag; every tag the
/// engine reasons about is a named variant here, and anything else is
/// preserved verbatim in `Custom` so the source format stays open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Query,
    Auth,
    ConfigChange,
    RoleAssigned,
    RoleRevoked,
    KeyRotation,
    AuditClear,
    UserCreate,
    UserDelete,
    SystemManage,
    Lockout,
    SessionStart,
    SessionEnd,
    Startup,
    Shutdown,
    /// Any tag not in the closed set, preserved verbatim.
    Custom(String),
}

impl EventKind {
    /// The wire tag for this kind — the exact string written to log lines.
    pub fn as_tag(&self) -> &str {
        match self {
            EventKind::Query => "QUERY",
            EventKind::Auth => "AUTH",
            EventKind::ConfigChange => "CONFIG_CHANGE",
            EventKind::RoleAssigned => "ROLE_ASSIGNED",
            EventKind::RoleRevoked => "ROLE_REVOKED",
            EventKind::KeyRotation => "ENCRYPTION_KEY_ROTATE",
            EventKind::AuditClear => "AUDIT_CLEAR",
            EventKind::UserCreate => "USER_CREATE",
            EventKind::UserDelete => "USER_DELETE",
            EventKind::SystemManage => "SYSTEM_MANAGE",
            EventKind::Lockout => "LOCKOUT",
            EventKind::SessionStart => "SESSION_START",
            EventKind::SessionEnd => "SESSION_END",
            EventKind::Startup => "STARTUP",
            EventKind::Shutdown => "SHUTDOWN",
            EventKind::Custom(tag) => tag,
        }
    }

    /// True for authentication events, including custom tags that embed
    /// `AUTH` (e.g. `AUTH_LOGIN`). Drives the failed-auth anomaly rule.
    pub fn is_auth_related(&self) -> bool {
        match self {
            EventKind::Auth => true,
            EventKind::Custom(tag) => tag.contains("AUTH"),
            _ => false,
        }
    }

    /// True for operations that require elevated privilege. These feed the
    /// high-privilege security indicator.
    pub fn is_high_privilege(&self) -> bool {
        matches!(
            self,
            EventKind::RoleAssigned
                | EventKind::RoleRevoked
                | EventKind::ConfigChange
                | EventKind::KeyRotation
                | EventKind::AuditClear
                | EventKind::UserCreate
                | EventKind::UserDelete
                | EventKind::SystemManage
        )
    }

    /// True for account-lockout events, including custom tags that embed
    /// `LOCKOUT`. Feeds the locked-account security indicator.
    pub fn is_lockout_related(&self) -> bool {
        match self {
            EventKind::Lockout => true,
            EventKind::Custom(tag) => tag.contains("LOCKOUT"),
            _ => false,
        }
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "QUERY" => EventKind::Query,
            "AUTH" => EventKind::Auth,
            "CONFIG_CHANGE" => EventKind::ConfigChange,
            "ROLE_ASSIGNED" => EventKind::RoleAssigned,
            "ROLE_REVOKED" => EventKind::RoleRevoked,
            "ENCRYPTION_KEY_ROTATE" => EventKind::KeyRotation,
            "AUDIT_CLEAR" => EventKind::AuditClear,
            "USER_CREATE" => EventKind::UserCreate,
            "USER_DELETE" => EventKind::UserDelete,
            "SYSTEM_MANAGE" => EventKind::SystemManage,
            "LOCKOUT" => EventKind::Lockout,
            "SESSION_START" => EventKind::SessionStart,
            "SESSION_END" => EventKind::SessionEnd,
            "STARTUP" => EventKind::Startup,
            "SHUTDOWN" => EventKind::Shutdown,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventKind::from(s))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(EventKind::from(tag.as_str()))
    }
}

// ── Event ─────────────────────────────────────────────────────────────────────

/// A single audited action.
///
/// The timestamp is attached at construction and never changes. Fields
/// serialize under the log format's JSON names, so a structured log line
/// deserializes directly into an `Event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "event_type")]
    pub kind: EventKind,

    pub session_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    /// Truncated/redacted by the logger before the event reaches custos.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default)]
    pub tokens: u64,

    #[serde(rename = "cost_cents", default)]
    pub cost: f64,

    pub success: bool,

    /// Present only when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Event {
    /// Create an event of the given kind, stamped with the current time.
    pub fn new(kind: EventKind, session_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            session_id: session_id.into(),
            tier: None,
            query: None,
            tokens: 0,
            cost: 0.0,
            success: true,
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Create a `QUERY` event with the usage figures the logger records.
    pub fn query(
        session_id: impl Into<String>,
        tier: impl Into<String>,
        query: impl Into<String>,
        tokens: u64,
        cost: f64,
        success: bool,
    ) -> Self {
        let mut event = Event::new(EventKind::Query, session_id);
        event.tier = Some(tier.into());
        event.query = Some(query.into());
        event.tokens = tokens;
        event.cost = cost;
        event.success = success;
        event
    }

    /// Mark the event failed with the given error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    /// Attach a metadata key/value pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Override the construction timestamp. Intended for replaying events
    /// whose wall-clock time was fixed by the logger.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
