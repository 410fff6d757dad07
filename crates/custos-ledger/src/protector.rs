//! The chain protector: signing, persistence, verification, and recovery
//! policy for the audit ledger.
//!
//! Per signed event the protector appends one chain entry and one witness
//! line, both persisted synchronously before `sign_log_entry` returns.
//! Deferring either write to a background task would reopen the exact
//! "operation continued without a verifiable record" hazard this layer
//! exists to close, so both writes block, retry with exponential backoff,
//! and — in strict mode — roll the entry back and return a distinguished
//! save-failure error when persistence cannot be achieved.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use custos_contracts::{CustosError, CustosResult, Event};
use custos_keys::{KeyConfig, KeyManager, KeyMetadata, RotationResult};

use crate::entry::{ChainEntry, WitnessRecord};
use crate::report::{IntegrityCheck, TamperReport};
use crate::seal;

/// Chain file name inside the audit directory.
pub const CHAIN_FILE_NAME: &str = "audit_chain.json";

/// Witness file name inside the audit directory.
pub const WITNESS_FILE_NAME: &str = "audit_witness.txt";

/// Default retention for archived logs: seven years.
pub const DEFAULT_RETENTION_DAYS: u32 = 365 * 7;

/// Grace period in seconds for clock skew when comparing file modification
/// times against the last chain entry.
const MTIME_GRACE_SECS: i64 = 60;

// ── Options ───────────────────────────────────────────────────────────────────

/// Retry schedule for chain and witness persistence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each attempt after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep before the given 1-based attempt (>= 2).
    fn backoff_before(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 2))
    }
}

/// Protector behavior knobs.
#[derive(Debug, Clone)]
pub struct ProtectorOptions {
    /// When true (the default via `ProtectorOptions::strict`), a
    /// persistence failure rolls back the in-memory entry and surfaces a
    /// save-failure error the caller should treat as fatal. When false,
    /// the entry stays queryable in memory and the failure is only logged.
    pub strict: bool,

    pub retry: RetryPolicy,
}

impl Default for ProtectorOptions {
    /// The compliance default: strict mode with the standard retry policy.
    fn default() -> Self {
        Self::strict()
    }
}

impl ProtectorOptions {
    /// Strict mode with the standard retry policy.
    pub fn strict() -> Self {
        Self {
            strict: true,
            retry: RetryPolicy::default(),
        }
    }
}

// ── Protector ─────────────────────────────────────────────────────────────────

/// Mutable state guarded by the protector's lock: the chain and the
/// signing key move together so rotation and signing can never observe
/// each other half-done.
struct LedgerState {
    chain: Vec<ChainEntry>,
    keys: KeyManager,
}

/// Cryptographic protection for an audit log: hash-chained entries, an
/// independent witness trail, and tamper detection over both.
///
/// # Thread safety
///
/// All chain mutation (`sign_log_entry`, `rotate_key`) holds the write
/// lock for the full write-and-retry sequence; verification and read
/// operations take the read lock. Concurrent signers are therefore
/// serialized — entries can never share an index or break linkage.
pub struct Protector {
    log_path: PathBuf,
    chain_path: PathBuf,
    witness_path: PathBuf,
    options: ProtectorOptions,
    state: RwLock<LedgerState>,
}

impl Protector {
    /// Build a protector for the given audit log path.
    ///
    /// The chain and witness files live next to the log file. The signing
    /// key is resolved through `config` (see `custos-keys`); failure to
    /// resolve a key is fatal — there is no unsigned fallback. An existing
    /// chain file is loaded so signing continues where it left off.
    pub fn new(
        log_path: impl Into<PathBuf>,
        config: &KeyConfig,
        options: ProtectorOptions,
    ) -> CustosResult<Self> {
        let log_path = log_path.into();
        let dir = log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let chain_path = dir.join(CHAIN_FILE_NAME);
        let witness_path = dir.join(WITNESS_FILE_NAME);

        let keys = KeyManager::load(&dir, config)?;

        let chain = if chain_path.exists() {
            let data = fs::read(&chain_path).map_err(|e| CustosError::ChainPersistence {
                reason: format!("failed to read chain file '{}': {}", chain_path.display(), e),
            })?;
            serde_json::from_slice(&data).map_err(|e| CustosError::Serialization {
                reason: format!("chain file '{}' is not valid JSON: {}", chain_path.display(), e),
            })?
        } else {
            Vec::new()
        };

        info!(
            chain_length = chain.len(),
            log = %log_path.display(),
            "audit protector initialized"
        );

        Ok(Self {
            log_path,
            chain_path,
            witness_path,
            options,
            state: RwLock::new(LedgerState { chain, keys }),
        })
    }

    /// The audit log file this protector covers.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn chain_path(&self) -> &Path {
        &self.chain_path
    }

    pub fn witness_path(&self) -> &Path {
        &self.witness_path
    }

    /// Number of entries currently in the chain.
    pub fn chain_length(&self) -> usize {
        self.state.read().expect("ledger state lock poisoned").chain.len()
    }

    /// A snapshot of the chain in order.
    pub fn entries(&self) -> Vec<ChainEntry> {
        self.state
            .read()
            .expect("ledger state lock poisoned")
            .chain
            .clone()
    }

    /// Metadata describing the current signing key.
    pub fn key_metadata(&self) -> KeyMetadata {
        self.state
            .read()
            .expect("ledger state lock poisoned")
            .keys
            .metadata()
            .clone()
    }

    // ── Signing ───────────────────────────────────────────────────────────────

    /// Sign one event into the chain and durably persist the result.
    ///
    /// Appends the chain entry in memory, rewrites the chain file
    /// atomically (temp file + rename), then appends and syncs one witness
    /// line — each step synchronous and retried per the configured policy.
    ///
    /// In strict mode a step that fails after all retries rolls the entry
    /// back out of memory (rewriting the chain file when it had already
    /// been persisted) and returns `CustosError::SaveFailed`; callers are
    /// expected to halt the operation they were about to audit. In
    /// non-strict mode the entry remains in memory and the failure is
    /// logged.
    pub fn sign_log_entry(&self, event: &Event) -> CustosResult<()> {
        let mut state = self.state.write().map_err(|e| CustosError::ChainPersistence {
            reason: format!("ledger state lock poisoned: {}", e),
        })?;

        let event_bytes = serde_json::to_vec(event).map_err(|e| CustosError::Serialization {
            reason: format!("failed to serialize event: {}", e),
        })?;

        let key = state.keys.current().as_bytes();
        let event_hash = seal::keyed_digest(key, &event_bytes);
        let previous_hash = state
            .chain
            .last()
            .map(|e| e.chain_hash.clone())
            .unwrap_or_default();

        let mut entry = ChainEntry {
            index: state.chain.len() as u64,
            timestamp: event.timestamp,
            event_hash,
            previous_hash,
            chain_hash: String::new(),
        };
        entry.chain_hash = seal::entry_digest(key, &entry);

        let witness = WitnessRecord::for_entry(&entry);
        state.chain.push(entry);

        if let Err(save_err) = self.with_retry("chain save", || self.persist_chain(&state.chain)) {
            if self.options.strict {
                state.chain.pop();
                return Err(save_err);
            }
            error!(error = %save_err, "chain save failed; entry retained in memory only");
        }

        if let Err(save_err) = self.with_retry("witness append", || self.append_witness(&witness))
        {
            if self.options.strict {
                // The chain file already contains the entry; rewrite it so
                // disk matches the rolled-back in-memory sequence.
                state.chain.pop();
                if let Err(rewrite_err) = self.persist_chain(&state.chain) {
                    error!(
                        error = %rewrite_err,
                        "failed to rewrite chain after witness failure rollback"
                    );
                }
                return Err(save_err);
            }
            error!(error = %save_err, "witness append failed; chain entry lacks witness line");
        }

        Ok(())
    }

    // ── Verification ──────────────────────────────────────────────────────────

    /// Walk the chain and re-derive every check: index positions, hash
    /// linkage, timestamp monotonicity, and recomputed chain hashes
    /// (compared in constant time).
    ///
    /// An empty chain where a chain file exists on disk is a critical
    /// finding — the content was wiped. An empty chain with no file is a
    /// fresh install and valid.
    pub fn verify_log_integrity(&self) -> IntegrityCheck {
        let state = self.state.read().expect("ledger state lock poisoned");
        self.verify_integrity_locked(&state)
    }

    fn verify_integrity_locked(&self, state: &LedgerState) -> IntegrityCheck {
        let mut issues = Vec::new();

        if state.chain.is_empty() {
            if self.chain_path.exists() {
                issues.push(
                    "CRITICAL: chain file exists but holds no entries - possible wipe or deletion"
                        .to_string(),
                );
            }
            return IntegrityCheck::from_issues(issues);
        }

        let key = state.keys.current().as_bytes();
        let mut last_timestamp: Option<DateTime<Utc>> = None;

        for (position, entry) in state.chain.iter().enumerate() {
            if entry.index != position as u64 {
                issues.push(format!(
                    "entry at position {} has incorrect index {}",
                    position, entry.index
                ));
            }

            if let Some(previous) = last_timestamp {
                if entry.timestamp < previous {
                    issues.push(format!(
                        "entry {} has non-monotonic timestamp: {} before {}",
                        position,
                        entry.timestamp.to_rfc3339(),
                        previous.to_rfc3339()
                    ));
                }
            }
            last_timestamp = Some(entry.timestamp);

            if position == 0 {
                if !entry.previous_hash.is_empty() {
                    issues.push(format!(
                        "entry 0 must have an empty previous hash, got '{}'",
                        entry.previous_hash
                    ));
                }
            } else if entry.previous_hash != state.chain[position - 1].chain_hash {
                issues.push(format!(
                    "entry {} has broken linkage: previous hash mismatch",
                    position
                ));
            }

            let recomputed = seal::entry_digest(key, entry);
            if !seal::digests_match(&entry.chain_hash, &recomputed) {
                issues.push(format!("entry {} has an invalid chain hash", position));
            }
        }

        IntegrityCheck::from_issues(issues)
    }

    /// Full tamper scan: chain verification, file permission checks, a
    /// modification-time plausibility check, and witness cross-checking.
    pub fn detect_tampering(&self) -> TamperReport {
        let state = self.state.read().expect("ledger state lock poisoned");

        let integrity = self.verify_integrity_locked(&state);
        let mut report = TamperReport {
            timestamp: Utc::now(),
            verified: integrity.valid,
            chain_length: state.chain.len(),
            issues: integrity.issues,
            permission_issues: Vec::new(),
            timestamp_anomalies: Vec::new(),
        };

        self.check_file_permissions(&mut report);
        self.check_file_timestamps(&state, &mut report);

        let witness = self.verify_witness_locked(&state);
        if !witness.valid {
            report.issues.extend(witness.issues);
            report.verified = false;
        }

        report
    }

    /// Cross-check every witness line against the chain.
    ///
    /// A witness line referencing an index at or beyond the chain length
    /// is tamper evidence: witness lines are only written after the chain
    /// entry is durably persisted, so an unmatched line means the chain
    /// was truncated or replaced. A witness file with fewer lines than the
    /// chain has entries is equally suspicious — an attacker replaced the
    /// chain without regenerating a consistent witness trail.
    pub fn verify_witness(&self) -> IntegrityCheck {
        let state = self.state.read().expect("ledger state lock poisoned");
        self.verify_witness_locked(&state)
    }

    fn verify_witness_locked(&self, state: &LedgerState) -> IntegrityCheck {
        let data = match fs::read_to_string(&self.witness_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // No witness trail yet — acceptable for a fresh system.
                return IntegrityCheck::ok();
            }
            Err(e) => {
                return IntegrityCheck::from_issues(vec![format!(
                    "failed to read witness file: {}",
                    e
                )]);
            }
        };

        let mut issues = Vec::new();
        let mut witnessed = 0usize;

        for (line_no, line) in data.lines().enumerate() {
            if line.is_empty() {
                continue;
            }

            let record = match WitnessRecord::parse(line) {
                Ok(record) => record,
                Err(reason) => {
                    issues.push(format!("witness line {}: {}", line_no + 1, reason));
                    continue;
                }
            };

            let Some(entry) = state.chain.get(record.index as usize) else {
                issues.push(format!(
                    "witness line {} references chain index {} beyond chain length {}",
                    line_no + 1,
                    record.index,
                    state.chain.len()
                ));
                continue;
            };

            if !seal::digests_match(&entry.chain_hash, &record.chain_hash) {
                issues.push(format!(
                    "witness line {} hash mismatch for chain index {}",
                    line_no + 1,
                    record.index
                ));
            }
            if entry.timestamp != record.timestamp {
                issues.push(format!(
                    "witness line {} timestamp mismatch for chain index {}: witness={}, chain={}",
                    line_no + 1,
                    record.index,
                    record.timestamp.to_rfc3339(),
                    entry.timestamp.to_rfc3339()
                ));
            }

            witnessed += 1;
        }

        if witnessed < state.chain.len() {
            issues.push(format!(
                "witness holds fewer entries ({}) than the chain ({}) - possible chain replacement",
                witnessed,
                state.chain.len()
            ));
        }

        IntegrityCheck::from_issues(issues)
    }

    /// The latest chain hash — a point-in-time fingerprint of the whole
    /// ledger, usable for external anchoring. `None` while the chain is
    /// empty.
    pub fn chain_head(&self) -> Option<String> {
        self.state
            .read()
            .expect("ledger state lock poisoned")
            .chain
            .last()
            .map(|e| e.chain_hash.clone())
    }

    // ── Key rotation ──────────────────────────────────────────────────────────

    /// Rotate the signing key, optionally re-signing the existing chain.
    ///
    /// With `resign_entries`, every entry's linkage and chain hash is
    /// recomputed under the new key and the chain is atomically persisted,
    /// so verification continues to succeed; stored event hashes are
    /// carried as committed data and re-sealed by the new chain hashes.
    /// Without it, the existing chain remains sealed under the old key and
    /// will no longer verify.
    pub fn rotate_key(&self, resign_entries: bool) -> CustosResult<RotationResult> {
        let mut state = self.state.write().map_err(|e| CustosError::ChainPersistence {
            reason: format!("ledger state lock poisoned: {}", e),
        })?;

        let LedgerState { chain, keys } = &mut *state;
        let mut result = keys.rotate()?;

        if resign_entries && !chain.is_empty() {
            let key = keys.current().as_bytes();
            let mut previous_hash = String::new();
            for entry in chain.iter_mut() {
                entry.previous_hash = previous_hash;
                entry.chain_hash = seal::entry_digest(key, entry);
                previous_hash = entry.chain_hash.clone();
            }

            let chain: &[ChainEntry] = chain;
            self.with_retry("chain save", || self.persist_chain(chain))?;
            result.entries_resigned = chain.len();

            info!(entries = chain.len(), "chain re-signed under rotated key");
        }

        Ok(result)
    }

    // ── File protection ───────────────────────────────────────────────────────

    /// Tighten permissions on the log, chain, and witness files to owner
    /// read/write only.
    pub fn protect_files(&self) -> CustosResult<()> {
        let _state = self.state.write().map_err(|e| CustosError::ChainPersistence {
            reason: format!("ledger state lock poisoned: {}", e),
        })?;

        for path in [&self.log_path, &self.chain_path, &self.witness_path] {
            if path.exists() {
                restrict_permissions(path)?;
            }
        }
        Ok(())
    }

    // ── Archival ──────────────────────────────────────────────────────────────

    /// Move rotated log files older than the retention window into the
    /// `archive/` directory next to the log.
    ///
    /// Each candidate is copied, the copy's digest is verified against the
    /// source, and only then is the original deleted — never
    /// delete-before-verify. Returns the number of files archived. A
    /// `retention_days` of zero selects the default retention
    /// (`DEFAULT_RETENTION_DAYS`).
    pub fn archive_logs(&self, retention_days: u32) -> CustosResult<usize> {
        let _state = self.state.write().map_err(|e| CustosError::ChainPersistence {
            reason: format!("ledger state lock poisoned: {}", e),
        })?;

        let retention = if retention_days == 0 {
            DEFAULT_RETENTION_DAYS
        } else {
            retention_days
        };
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention));

        let dir = self
            .log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let archive_dir = dir.join("archive");
        fs::create_dir_all(&archive_dir).map_err(|e| CustosError::Archive {
            reason: format!("failed to create archive directory: {}", e),
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&archive_dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
                CustosError::Archive {
                    reason: format!("failed to restrict archive directory: {}", e),
                }
            })?;
        }

        let live_name = self.log_path.file_name().and_then(|n| n.to_str());
        let stem = self
            .log_path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let entries = fs::read_dir(dir).map_err(|e| CustosError::Archive {
            reason: format!("failed to read log directory: {}", e),
        })?;

        let mut archived = 0usize;
        for dir_entry in entries.flatten() {
            let name = dir_entry.file_name();
            let Some(name) = name.to_str() else { continue };

            // Only rotated siblings of the live log file are candidates.
            if !name.starts_with(&stem) || Some(name) == live_name {
                continue;
            }
            let Ok(metadata) = dir_entry.metadata() else { continue };
            if !metadata.is_file() {
                continue;
            }
            let Ok(modified) = metadata.modified() else { continue };
            if DateTime::<Utc>::from(modified) >= cutoff {
                continue;
            }

            let src = dir_entry.path();
            let dst = archive_dir.join(name);
            match archive_one(&src, &dst) {
                Ok(()) => archived += 1,
                Err(e) => {
                    warn!(file = name, error = %e, "failed to archive log file");
                }
            }
        }

        if archived > 0 {
            info!(count = archived, retention_days = retention, "archived rotated audit logs");
        }
        Ok(archived)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    /// Run one persistence step under the retry policy, escalating to the
    /// distinguished save-failure error when every attempt fails.
    fn with_retry<F>(&self, operation: &str, mut attempt_fn: F) -> CustosResult<()>
    where
        F: FnMut() -> CustosResult<()>,
    {
        let policy = &self.options.retry;
        let mut last_error: Option<CustosError> = None;

        for attempt in 1..=policy.max_attempts {
            if attempt > 1 {
                let delay = policy.backoff_before(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying audit persistence"
                );
                thread::sleep(delay);
            }

            match attempt_fn() {
                Ok(()) => {
                    if attempt > 1 {
                        info!(operation, attempt, "audit persistence succeeded after retry");
                    }
                    return Ok(());
                }
                Err(e) => {
                    warn!(operation, attempt, error = %e, "audit persistence attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(CustosError::SaveFailed {
            operation: operation.to_string(),
            attempts: policy.max_attempts,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown failure".to_string()),
        })
    }

    /// Atomically rewrite the chain file: write a temp file in the same
    /// directory, sync it, then rename over the target.
    fn persist_chain(&self, chain: &[ChainEntry]) -> CustosResult<()> {
        let data = serde_json::to_vec_pretty(chain).map_err(|e| CustosError::Serialization {
            reason: format!("failed to serialize chain: {}", e),
        })?;

        let dir = self
            .chain_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CustosError::ChainPersistence {
            reason: format!("failed to create temp chain file: {}", e),
        })?;
        tmp.write_all(&data)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| CustosError::ChainPersistence {
                reason: format!("failed to write temp chain file: {}", e),
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600)).map_err(|e| {
                CustosError::ChainPersistence {
                    reason: format!("failed to restrict temp chain file: {}", e),
                }
            })?;
        }

        tmp.persist(&self.chain_path)
            .map_err(|e| CustosError::ChainPersistence {
                reason: format!("failed to replace chain file: {}", e),
            })?;
        Ok(())
    }

    /// Append one witness line and sync it to disk.
    fn append_witness(&self, record: &WitnessRecord) -> CustosResult<()> {
        let mut file = open_append_restricted(&self.witness_path).map_err(|e| {
            CustosError::ChainPersistence {
                reason: format!("failed to open witness file: {}", e),
            }
        })?;
        writeln!(file, "{}", record.to_line())
            .and_then(|_| file.sync_all())
            .map_err(|e| CustosError::ChainPersistence {
                reason: format!("failed to write witness line: {}", e),
            })
    }

    /// Flag group/world-accessible permission bits on the log and chain
    /// files.
    #[cfg(unix)]
    fn check_file_permissions(&self, report: &mut TamperReport) {
        use std::os::unix::fs::PermissionsExt;

        for path in [&self.log_path, &self.chain_path] {
            if let Ok(metadata) = fs::metadata(path) {
                let mode = metadata.permissions().mode() & 0o777;
                if mode & 0o077 != 0 {
                    report.permission_issues.push(format!(
                        "'{}' has overly permissive mode {:o}",
                        path.display(),
                        mode
                    ));
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn check_file_permissions(&self, _report: &mut TamperReport) {}

    /// Flag a log file whose modification time postdates the last chain
    /// entry beyond the clock-skew grace period: writes happened that were
    /// never signed into the chain.
    fn check_file_timestamps(&self, state: &LedgerState, report: &mut TamperReport) {
        let Some(last) = state.chain.last() else { return };
        let Ok(metadata) = fs::metadata(&self.log_path) else { return };
        let Ok(modified) = metadata.modified() else { return };

        let modified = DateTime::<Utc>::from(modified);
        if modified > last.timestamp + chrono::Duration::seconds(MTIME_GRACE_SECS) {
            report.timestamp_anomalies.push(format!(
                "log file modified after last chain entry: file={}, chain={}",
                modified.to_rfc3339(),
                last.timestamp.to_rfc3339()
            ));
        }
    }
}

// ── File helpers ──────────────────────────────────────────────────────────────

/// Copy `src` to `dst`, verify the copy's digest against the source, and
/// delete the original only after the digests match.
pub(crate) fn archive_one(src: &Path, dst: &Path) -> CustosResult<()> {
    copy_file(src, dst)?;
    verify_archive_copy(src, dst)?;
    fs::remove_file(src).map_err(|e| CustosError::Archive {
        reason: format!("failed to remove archived source '{}': {}", src.display(), e),
    })
}

pub(crate) fn verify_archive_copy(src: &Path, dst: &Path) -> CustosResult<()> {
    let src_hash = hash_file(src)?;
    let dst_hash = hash_file(dst)?;
    if !seal::digests_match(&src_hash, &dst_hash) {
        return Err(CustosError::Archive {
            reason: format!(
                "archive verification failed: '{}' does not match '{}'",
                dst.display(),
                src.display()
            ),
        });
    }
    Ok(())
}

/// SHA-256 of a file's contents as lowercase hex.
pub(crate) fn hash_file(path: &Path) -> CustosResult<String> {
    let data = fs::read(path).map_err(|e| CustosError::Archive {
        reason: format!("failed to read '{}': {}", path.display(), e),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn copy_file(src: &Path, dst: &Path) -> CustosResult<()> {
    fs::copy(src, dst).map_err(|e| CustosError::Archive {
        reason: format!(
            "failed to copy '{}' to '{}': {}",
            src.display(),
            dst.display(),
            e
        ),
    })?;
    if let Err(e) = restrict_permissions(dst) {
        return Err(CustosError::Archive {
            reason: format!("failed to restrict archived copy: {}", e),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> CustosResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        CustosError::ChainPersistence {
            reason: format!("failed to set permissions on '{}': {}", path.display(), e),
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> CustosResult<()> {
    Ok(())
}

#[cfg(unix)]
fn open_append_restricted(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_append_restricted(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().create(true).append(true).open(path)
}
