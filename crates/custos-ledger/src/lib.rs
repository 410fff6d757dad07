//! # custos-ledger
//!
//! Hash-chained, signed audit ledger with independent witness anchoring.
//!
//! ## Overview
//!
//! Every audited event is sealed into a `ChainEntry` that commits to its
//! predecessor through a keyed hash, so inserting, deleting, or editing a
//! past entry breaks the recomputed linkage. Each entry is also anchored
//! in a separate append-only witness file, so replacing the whole chain
//! file leaves a witness trail the attacker did not regenerate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use custos_keys::KeyConfig;
//! use custos_ledger::{Protector, ProtectorOptions};
//!
//! let protector = Protector::new(
//!     "audit/audit.log",
//!     &KeyConfig::from_env(),
//!     ProtectorOptions::strict(),
//! )?;
//! protector.sign_log_entry(&event)?;
//!
//! let check = protector.verify_log_integrity();
//! assert!(check.valid, "{:?}", check.issues);
//! ```

pub mod entry;
pub mod protector;
pub mod report;
pub mod seal;

pub use entry::{ChainEntry, WitnessRecord};
pub use protector::{
    Protector, ProtectorOptions, RetryPolicy, CHAIN_FILE_NAME, DEFAULT_RETENTION_DAYS,
    WITNESS_FILE_NAME,
};
pub use report::{IntegrityCheck, TamperReport};
pub use seal::{digests_match, keyed_digest};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use chrono::Utc;

    use custos_contracts::{CustosError, Event};
    use custos_keys::KeyConfig;
    use tempfile::TempDir;

    use super::entry::ChainEntry;
    use super::protector::{archive_one, verify_archive_copy};
    use super::{Protector, ProtectorOptions, RetryPolicy};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Options with millisecond backoff so retry-exhaustion tests stay fast.
    fn test_options(strict: bool) -> ProtectorOptions {
        ProtectorOptions {
            strict,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        }
    }

    fn open(dir: &Path) -> Protector {
        Protector::new(dir.join("audit.log"), &KeyConfig::default(), test_options(true)).unwrap()
    }

    fn open_with(dir: &Path, config: &KeyConfig) -> Protector {
        Protector::new(dir.join("audit.log"), config, test_options(true)).unwrap()
    }

    fn fixed_key_config() -> KeyConfig {
        KeyConfig {
            key_hex: Some("ab".repeat(32)),
            key_file: None,
        }
    }

    fn query_event(session: &str, tokens: u64, cost: f64) -> Event {
        Event::query(session, "local", "lookup", tokens, cost, true)
    }

    // ── Chain linkage ─────────────────────────────────────────────────────────

    /// Every entry links to its predecessor; entry 0 has an empty previous
    /// hash; indexes match positions.
    #[test]
    fn chain_links_every_entry() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());

        for i in 0..3 {
            protector
                .sign_log_entry(&query_event("sess-1", 100 * (i + 1), 0.01))
                .unwrap();
        }

        let entries = protector.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].previous_hash, "");
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.index, i as u64);
            if i > 0 {
                assert_eq!(entry.previous_hash, entries[i - 1].chain_hash);
            }
        }

        let check = protector.verify_log_integrity();
        assert!(check.valid, "unexpected issues: {:?}", check.issues);
    }

    /// Signing N events then rebuilding from disk yields the identical
    /// chain, and verification passes with zero issues.
    #[test]
    fn reload_preserves_chain() {
        let dir = TempDir::new().unwrap();
        let original = {
            let protector = open(dir.path());
            for i in 0..4 {
                protector
                    .sign_log_entry(&query_event("sess-r", 50 + i, 0.005))
                    .unwrap();
            }
            protector.entries()
        };

        let reopened = open(dir.path());
        assert_eq!(reopened.entries(), original);

        let check = reopened.verify_log_integrity();
        assert!(check.valid);
        assert!(check.issues.is_empty());
    }

    // ── Tamper detection ──────────────────────────────────────────────────────

    /// Mutating any persisted field is detected after reload.
    #[test]
    fn edited_entry_fails_verification() {
        let dir = TempDir::new().unwrap();
        {
            let protector = open(dir.path());
            for _ in 0..3 {
                protector.sign_log_entry(&query_event("sess-t", 10, 0.001)).unwrap();
            }
        }

        // Rewrite the middle entry's event hash directly in the chain file.
        let chain_path = dir.path().join(super::CHAIN_FILE_NAME);
        let mut chain: Vec<ChainEntry> =
            serde_json::from_slice(&fs::read(&chain_path).unwrap()).unwrap();
        chain[1].event_hash = "00".repeat(32);
        fs::write(&chain_path, serde_json::to_vec_pretty(&chain).unwrap()).unwrap();

        let reopened = open(dir.path());
        let check = reopened.verify_log_integrity();
        assert!(!check.valid);
        assert!(!check.issues.is_empty());
    }

    /// Tampering with an index breaks both the position check and the
    /// sealed hash.
    #[test]
    fn edited_index_fails_verification() {
        let dir = TempDir::new().unwrap();
        {
            let protector = open(dir.path());
            protector.sign_log_entry(&query_event("sess-i", 10, 0.001)).unwrap();
            protector.sign_log_entry(&query_event("sess-i", 20, 0.002)).unwrap();
        }

        let chain_path = dir.path().join(super::CHAIN_FILE_NAME);
        let mut chain: Vec<ChainEntry> =
            serde_json::from_slice(&fs::read(&chain_path).unwrap()).unwrap();
        chain[1].index = 7;
        fs::write(&chain_path, serde_json::to_vec_pretty(&chain).unwrap()).unwrap();

        let check = open(dir.path()).verify_log_integrity();
        assert!(!check.valid);
        assert!(check.issues.iter().any(|i| i.contains("incorrect index")));
    }

    /// A chain file that exists but parses to zero entries is a critical
    /// finding, not a vacuously valid state.
    #[test]
    fn empty_chain_file_is_critical() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(super::CHAIN_FILE_NAME), b"[]").unwrap();

        let protector = open(dir.path());
        let check = protector.verify_log_integrity();
        assert!(!check.valid);
        assert!(check.issues.iter().any(|i| i.contains("CRITICAL")));
    }

    /// A fresh install — no chain file at all — verifies clean.
    #[test]
    fn fresh_install_is_valid() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());

        let check = protector.verify_log_integrity();
        assert!(check.valid);
        assert!(protector.chain_head().is_none());
    }

    /// An out-of-order timestamp in the chain is flagged.
    #[test]
    fn out_of_order_timestamp_flagged() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());

        let now = Utc::now();
        protector
            .sign_log_entry(&query_event("sess-o", 10, 0.001).at(now))
            .unwrap();
        protector
            .sign_log_entry(
                &query_event("sess-o", 20, 0.002).at(now - chrono::Duration::hours(1)),
            )
            .unwrap();

        let check = protector.verify_log_integrity();
        assert!(!check.valid);
        assert!(check.issues.iter().any(|i| i.contains("non-monotonic")));
    }

    // ── Witness cross-check ───────────────────────────────────────────────────

    /// The witness trail matches a healthy chain line-for-line.
    #[test]
    fn witness_matches_after_signing() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());
        for _ in 0..3 {
            protector.sign_log_entry(&query_event("sess-w", 10, 0.001)).unwrap();
        }

        let check = protector.verify_witness();
        assert!(check.valid, "unexpected issues: {:?}", check.issues);

        let witness = fs::read_to_string(protector.witness_path()).unwrap();
        assert_eq!(witness.lines().count(), 3);
    }

    /// Truncating the witness file is suspicious even though chain
    /// verification alone still passes.
    #[test]
    fn truncated_witness_is_suspicious() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());
        for _ in 0..3 {
            protector.sign_log_entry(&query_event("sess-c", 10, 0.001)).unwrap();
        }

        let witness_path = protector.witness_path().to_path_buf();
        let kept: Vec<String> = fs::read_to_string(&witness_path)
            .unwrap()
            .lines()
            .take(2)
            .map(String::from)
            .collect();
        fs::write(&witness_path, format!("{}\n", kept.join("\n"))).unwrap();

        assert!(protector.verify_log_integrity().valid);

        let check = protector.verify_witness();
        assert!(!check.valid);
        assert!(check.issues.iter().any(|i| i.contains("fewer entries")));

        let report = protector.detect_tampering();
        assert!(!report.verified);
    }

    /// A witness line pointing past the end of the chain is tamper
    /// evidence — the chain was truncated or replaced.
    #[test]
    fn witness_beyond_chain_is_flagged() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());
        protector.sign_log_entry(&query_event("sess-b", 10, 0.001)).unwrap();
        protector.sign_log_entry(&query_event("sess-b", 20, 0.002)).unwrap();

        let extra = format!("{}|5|{}\n", Utc::now().to_rfc3339(), "cd".repeat(32));
        let mut witness = fs::read_to_string(protector.witness_path()).unwrap();
        witness.push_str(&extra);
        fs::write(protector.witness_path(), witness).unwrap();

        let check = protector.verify_witness();
        assert!(!check.valid);
        assert!(check
            .issues
            .iter()
            .any(|i| i.contains("beyond chain length")));
    }

    // ── Retry and halt semantics ──────────────────────────────────────────────

    /// When persistence fails after all retries in strict mode, the entry
    /// is rolled back and the distinguished save-failure error returned.
    #[test]
    fn strict_mode_rolls_back_on_save_failure() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());

        // Destroy the audit directory so every persistence attempt fails.
        fs::remove_dir_all(dir.path()).unwrap();

        let err = protector
            .sign_log_entry(&query_event("sess-f", 10, 0.001))
            .unwrap_err();
        assert!(err.is_save_failure());
        assert!(matches!(err, CustosError::SaveFailed { attempts: 3, .. }));
        assert_eq!(protector.chain_length(), 0);
    }

    /// In non-strict mode the entry stays queryable in memory despite the
    /// persistence failure.
    #[test]
    fn non_strict_keeps_entry_in_memory() {
        let dir = TempDir::new().unwrap();
        let protector = Protector::new(
            dir.path().join("audit.log"),
            &KeyConfig::default(),
            test_options(false),
        )
        .unwrap();

        fs::remove_dir_all(dir.path()).unwrap();

        protector
            .sign_log_entry(&query_event("sess-n", 10, 0.001))
            .unwrap();
        assert_eq!(protector.chain_length(), 1);
        assert!(protector.chain_head().is_some());
    }

    /// A witness failure in strict mode also rolls back, rewriting the
    /// already-persisted chain file so disk matches memory.
    #[test]
    fn witness_failure_rolls_back_and_rewrites_chain() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());

        // A directory at the witness path makes every append fail while
        // chain saves still succeed.
        fs::create_dir(protector.witness_path()).unwrap();

        let err = protector
            .sign_log_entry(&query_event("sess-x", 10, 0.001))
            .unwrap_err();
        assert!(err.is_save_failure());
        assert_eq!(protector.chain_length(), 0);

        let chain: Vec<ChainEntry> =
            serde_json::from_slice(&fs::read(protector.chain_path()).unwrap()).unwrap();
        assert!(chain.is_empty(), "chain file must match the rolled-back state");
    }

    // ── Chain head ────────────────────────────────────────────────────────────

    /// The chain head fingerprint equals the last entry's chain hash.
    #[test]
    fn chain_head_tracks_last_entry() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());

        for (tokens, cost) in [(100, 0.01), (200, 0.02), (500, 0.05)] {
            protector
                .sign_log_entry(&query_event("sess-h", tokens, cost))
                .unwrap();
        }

        let entries = protector.entries();
        assert_eq!(protector.chain_head().as_deref(), Some(entries[2].chain_hash.as_str()));
    }

    // ── Key rotation ──────────────────────────────────────────────────────────

    /// Rotating with re-signing keeps verification green under the new
    /// key, while the old key no longer verifies the chain.
    #[test]
    fn rotation_with_resign_stays_valid() {
        let dir = TempDir::new().unwrap();
        let old_config = fixed_key_config();
        {
            let protector = open_with(dir.path(), &old_config);
            protector.sign_log_entry(&query_event("sess-k", 10, 0.001)).unwrap();
            protector.sign_log_entry(&query_event("sess-k", 20, 0.002)).unwrap();

            let result = protector.rotate_key(true).unwrap();
            assert_eq!(result.entries_resigned, 2);
            assert_ne!(result.old_fingerprint, result.new_fingerprint);

            let check = protector.verify_log_integrity();
            assert!(check.valid, "unexpected issues: {:?}", check.issues);
        }

        // The rotated key was persisted to the default key file.
        let with_new_key = open(dir.path());
        assert!(with_new_key.verify_log_integrity().valid);

        // Forcing the old key back in must now fail verification.
        let with_old_key = open_with(dir.path(), &old_config);
        assert!(!with_old_key.verify_log_integrity().valid);
    }

    /// Rotation without re-signing leaves the existing chain sealed under
    /// the departed key.
    #[test]
    fn rotation_without_resign_invalidates_chain() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());
        protector.sign_log_entry(&query_event("sess-k2", 10, 0.001)).unwrap();

        let result = protector.rotate_key(false).unwrap();
        assert_eq!(result.entries_resigned, 0);

        assert!(!protector.verify_log_integrity().valid);
    }

    // ── File-level checks ─────────────────────────────────────────────────────

    /// Group/world-readable chain files show up as permission issues
    /// without flipping the chain verdict itself.
    #[cfg(unix)]
    #[test]
    fn permissive_chain_file_flagged() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());
        protector.sign_log_entry(&query_event("sess-p", 10, 0.001)).unwrap();

        fs::set_permissions(
            protector.chain_path(),
            fs::Permissions::from_mode(0o644),
        )
        .unwrap();

        let report = protector.detect_tampering();
        assert!(report.verified, "permissions alone do not falsify the chain");
        assert!(!report.permission_issues.is_empty());
    }

    /// `protect_files` restores owner-only permissions.
    #[cfg(unix)]
    #[test]
    fn protect_files_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());
        protector.sign_log_entry(&query_event("sess-p2", 10, 0.001)).unwrap();

        fs::set_permissions(protector.chain_path(), fs::Permissions::from_mode(0o666)).unwrap();
        protector.protect_files().unwrap();

        let mode = fs::metadata(protector.chain_path())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    /// A log file written after the last chain entry (beyond clock skew)
    /// is reported as a timestamp anomaly.
    #[test]
    fn stale_log_write_is_flagged() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());

        fs::write(protector.log_path(), b"one line\n").unwrap();
        protector
            .sign_log_entry(
                &query_event("sess-m", 10, 0.001).at(Utc::now() - chrono::Duration::hours(2)),
            )
            .unwrap();

        let report = protector.detect_tampering();
        assert!(!report.timestamp_anomalies.is_empty());
    }

    // ── Archival ──────────────────────────────────────────────────────────────

    /// Rotated log files inside the retention window stay where they are.
    #[test]
    fn archive_keeps_recent_rotated_logs() {
        let dir = TempDir::new().unwrap();
        let protector = open(dir.path());
        let rotated = dir.path().join("audit.log.1");
        fs::write(&rotated, b"old entries\n").unwrap();

        let archived = protector.archive_logs(30).unwrap();
        assert_eq!(archived, 0);
        assert!(rotated.exists());
    }

    /// The archive step deletes the source only after the copy verifies.
    #[test]
    fn archive_verifies_before_delete() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("audit.log.2");
        let dst = dir.path().join("archived.log.2");
        fs::write(&src, b"ledger history\n").unwrap();

        archive_one(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"ledger history\n");
    }

    /// A copy that does not match its source fails verification.
    #[test]
    fn archive_copy_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.log");
        let dst = dir.path().join("b.log");
        fs::write(&src, b"original").unwrap();
        fs::write(&dst, b"corrupted").unwrap();

        let err = verify_archive_copy(&src, &dst).unwrap_err();
        assert!(err.to_string().contains("archive verification failed"));
    }
}
