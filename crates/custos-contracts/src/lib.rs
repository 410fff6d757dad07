//! # custos-contracts
//!
//! Shared event model and error types for the custos audit engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions and error types.

pub mod error;
pub mod event;

pub use error::{CustosError, CustosResult};
pub use event::{Event, EventKind};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // ── EventKind tags ───────────────────────────────────────────────────────

    #[test]
    fn kind_tags_round_trip() {
        let kinds = [
            EventKind::Query,
            EventKind::Auth,
            EventKind::ConfigChange,
            EventKind::RoleAssigned,
            EventKind::RoleRevoked,
            EventKind::KeyRotation,
            EventKind::AuditClear,
            EventKind::UserCreate,
            EventKind::UserDelete,
            EventKind::SystemManage,
            EventKind::Lockout,
            EventKind::SessionStart,
            EventKind::SessionEnd,
            EventKind::Startup,
            EventKind::Shutdown,
        ];

        for kind in kinds {
            let decoded = EventKind::from(kind.as_tag());
            assert_eq!(kind, decoded, "tag '{}' must round-trip", kind);
        }
    }

    #[test]
    fn unknown_tag_is_preserved_as_custom() {
        let kind = EventKind::from("PLUGIN_RELOAD");
        assert_eq!(kind, EventKind::Custom("PLUGIN_RELOAD".to_string()));
        assert_eq!(kind.as_tag(), "PLUGIN_RELOAD");
    }

    #[test]
    fn auth_predicate_covers_custom_tags() {
        assert!(EventKind::Auth.is_auth_related());
        assert!(EventKind::from("AUTH_LOGIN").is_auth_related());
        assert!(!EventKind::Query.is_auth_related());
    }

    #[test]
    fn high_privilege_predicate() {
        assert!(EventKind::RoleAssigned.is_high_privilege());
        assert!(EventKind::ConfigChange.is_high_privilege());
        assert!(EventKind::KeyRotation.is_high_privilege());
        assert!(EventKind::AuditClear.is_high_privilege());
        assert!(!EventKind::Query.is_high_privilege());
        assert!(!EventKind::Auth.is_high_privilege());
    }

    #[test]
    fn lockout_predicate_covers_custom_tags() {
        assert!(EventKind::Lockout.is_lockout_related());
        assert!(EventKind::from("ACCOUNT_LOCKOUT").is_lockout_related());
        assert!(!EventKind::SessionEnd.is_lockout_related());
    }

    // ── Event serde ──────────────────────────────────────────────────────────

    #[test]
    fn event_serializes_under_log_field_names() {
        let event = Event::query("sess-1", "local", "what is rust", 120, 0.02, true);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "QUERY");
        assert_eq!(json["session_id"], "sess-1");
        assert_eq!(json["cost_cents"], 0.02);
        assert_eq!(json["tokens"], 120);
        // A successful event never carries an error field.
        assert!(json.get("error").is_none());
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = Event::new(EventKind::ConfigChange, "sess-2")
            .with_metadata("setting", "retention_days")
            .with_error("approval missing");

        let json = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, decoded);
        assert!(!decoded.success);
        assert_eq!(decoded.error.as_deref(), Some("approval missing"));
    }

    #[test]
    fn structured_log_line_deserializes() {
        // A line as the external logger writes it.
        let line = r#"{"timestamp":"2026-03-01T09:30:00Z","event_type":"AUTH","session_id":"s9","success":false,"error":"bad token"}"#;
        let event: Event = serde_json::from_str(line).unwrap();

        assert_eq!(event.kind, EventKind::Auth);
        assert_eq!(event.tokens, 0);
        assert_eq!(event.cost, 0.0);
        assert!(!event.success);
    }

    #[test]
    fn at_overrides_timestamp() {
        let fixed = "2026-01-15T08:00:00Z".parse().unwrap();
        let event = Event::new(EventKind::Startup, "s1").at(fixed);
        assert_eq!(event.timestamp, fixed);
        assert!(event.timestamp < Utc::now());
    }

    // ── CustosError ──────────────────────────────────────────────────────────

    #[test]
    fn save_failed_is_distinguished() {
        let err = CustosError::SaveFailed {
            operation: "chain save".to_string(),
            attempts: 3,
            reason: "disk full".to_string(),
        };
        assert!(err.is_save_failure());
        let msg = err.to_string();
        assert!(msg.contains("audit save failed"));
        assert!(msg.contains("3 attempts"));

        let other = CustosError::ChainPersistence {
            reason: "disk full".to_string(),
        };
        assert!(!other.is_save_failure());
    }

    #[test]
    fn key_init_display() {
        let err = CustosError::KeyInit {
            reason: "no key source configured".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("signing key initialization failed"));
        assert!(msg.contains("no key source configured"));
    }
}
