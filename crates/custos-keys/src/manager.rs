//! Signing-key resolution, persistence, and rotation.
//!
//! Resolution order:
//!
//! 1. An explicit hex-encoded key value from configuration.
//! 2. An explicit key-file path from configuration.
//! 3. The default key file inside the audit directory, generated with
//!    CSPRNG bytes and owner-only permissions when absent.
//!
//! A source that is present but invalid (bad hex, wrong length, unreadable
//! or group/world-accessible file) is a hard error — the resolver never
//! falls through to a weaker source, and there is no unsigned fallback.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use custos_contracts::{CustosError, CustosResult};

use crate::key::{KeySource, SigningKey, KEY_SIZE};

/// Default key file name inside the audit directory.
pub const DEFAULT_KEY_FILE_NAME: &str = ".audit_key";

/// Environment variable carrying a hex-encoded key value.
pub const KEY_ENV_VAR: &str = "CUSTOS_AUDIT_KEY";

/// Environment variable carrying a key-file path.
pub const KEY_FILE_ENV_VAR: &str = "CUSTOS_AUDIT_KEY_FILE";

// ── Configuration ─────────────────────────────────────────────────────────────

/// Explicit key-source overrides.
///
/// Components receive this struct rather than reading the process
/// environment themselves; `KeyConfig::from_env` is the one place the
/// environment is consulted.
#[derive(Debug, Clone, Default)]
pub struct KeyConfig {
    /// Hex-encoded 32-byte key. Takes priority over everything else.
    pub key_hex: Option<String>,

    /// Path to a file holding the raw 32-byte key.
    pub key_file: Option<PathBuf>,
}

impl KeyConfig {
    /// Read overrides from `CUSTOS_AUDIT_KEY` / `CUSTOS_AUDIT_KEY_FILE`.
    pub fn from_env() -> Self {
        Self {
            key_hex: std::env::var(KEY_ENV_VAR).ok().filter(|v| !v.is_empty()),
            key_file: std::env::var(KEY_FILE_ENV_VAR)
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

// ── Metadata ──────────────────────────────────────────────────────────────────

/// Operator-facing description of the current key. Never contains key bytes.
#[derive(Debug, Clone, Serialize)]
pub struct KeyMetadata {
    pub source: KeySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
    pub key_size: usize,
    pub loaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotated_at: Option<DateTime<Utc>>,
    pub fingerprint: String,
}

/// Outcome of a key rotation.
#[derive(Debug, Clone, Serialize)]
pub struct RotationResult {
    pub rotated_at: DateTime<Utc>,
    pub old_fingerprint: String,
    pub new_fingerprint: String,
    pub new_key_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_key_backup: Option<PathBuf>,
    /// Filled in by the protector when it re-signs the chain.
    pub entries_resigned: usize,
}

// ── Manager ───────────────────────────────────────────────────────────────────

/// Loads, persists, and rotates the chain signing key.
#[derive(Debug)]
pub struct KeyManager {
    base_dir: PathBuf,
    key: SigningKey,
    metadata: KeyMetadata,
}

impl KeyManager {
    /// Resolve the signing key and build a manager around it.
    ///
    /// Returns `CustosError::KeyInit` when the highest-priority configured
    /// source cannot produce a valid key.
    pub fn load(base_dir: impl Into<PathBuf>, config: &KeyConfig) -> CustosResult<Self> {
        let base_dir = base_dir.into();

        let (key, key_path) = if let Some(encoded) = &config.key_hex {
            (SigningKey::from_hex(encoded, KeySource::Environment)?, None)
        } else if let Some(path) = &config.key_file {
            (
                read_key_file(path, KeySource::EnvironmentFile)?,
                Some(path.clone()),
            )
        } else {
            let path = base_dir.join(DEFAULT_KEY_FILE_NAME);
            let key = if path.exists() {
                read_key_file(&path, KeySource::DefaultFile)?
            } else {
                let key = SigningKey::generate(KeySource::Generated);
                fs::create_dir_all(&base_dir).map_err(|e| CustosError::KeyInit {
                    reason: format!(
                        "failed to create audit directory '{}': {}",
                        base_dir.display(),
                        e
                    ),
                })?;
                write_key_file(&path, key.as_bytes())?;
                key
            };
            (key, Some(path))
        };

        let metadata = KeyMetadata {
            source: key.source(),
            key_path,
            key_size: KEY_SIZE,
            loaded_at: Utc::now(),
            rotated_at: None,
            fingerprint: key.fingerprint(),
        };

        info!(
            source = %key.source(),
            fingerprint = %metadata.fingerprint,
            "audit signing key loaded"
        );

        Ok(Self {
            base_dir,
            key,
            metadata,
        })
    }

    /// The current signing key.
    pub fn current(&self) -> &SigningKey {
        &self.key
    }

    /// Metadata describing the current key.
    pub fn metadata(&self) -> &KeyMetadata {
        &self.metadata
    }

    /// The default key file path inside the audit directory.
    pub fn default_key_path(&self) -> PathBuf {
        self.base_dir.join(DEFAULT_KEY_FILE_NAME)
    }

    /// Generate and install a new key.
    ///
    /// The old default key file (if any) is renamed to a timestamped
    /// backup before the new key is written with owner-only permissions.
    /// The previous in-memory key is zeroed when its owner drops it.
    pub fn rotate(&mut self) -> CustosResult<RotationResult> {
        let new_key = SigningKey::generate(KeySource::DefaultFile);
        let rotated_at = Utc::now();
        let key_path = self.default_key_path();

        let old_key_backup = if key_path.exists() {
            let backup = self.base_dir.join(format!(
                "{}.{}.bak",
                DEFAULT_KEY_FILE_NAME,
                rotated_at.format("%Y%m%d_%H%M%S")
            ));
            fs::rename(&key_path, &backup).map_err(|e| CustosError::KeyInit {
                reason: format!("failed to back up old key file: {}", e),
            })?;
            Some(backup)
        } else {
            None
        };

        fs::create_dir_all(&self.base_dir).map_err(|e| CustosError::KeyInit {
            reason: format!(
                "failed to create audit directory '{}': {}",
                self.base_dir.display(),
                e
            ),
        })?;
        write_key_file(&key_path, new_key.as_bytes())?;

        let result = RotationResult {
            rotated_at,
            old_fingerprint: self.key.fingerprint(),
            new_fingerprint: new_key.fingerprint(),
            new_key_path: key_path.clone(),
            old_key_backup,
            entries_resigned: 0,
        };

        // Dropping the old key zeroes its bytes.
        self.key = new_key;
        self.metadata = KeyMetadata {
            source: KeySource::DefaultFile,
            key_path: Some(key_path),
            key_size: KEY_SIZE,
            loaded_at: rotated_at,
            rotated_at: Some(rotated_at),
            fingerprint: result.new_fingerprint.clone(),
        };

        info!(
            old_fingerprint = %result.old_fingerprint,
            new_fingerprint = %result.new_fingerprint,
            "audit signing key rotated"
        );

        Ok(result)
    }
}

// ── File helpers ──────────────────────────────────────────────────────────────

/// Read a raw key file, enforcing length and (on Unix) owner-only
/// permissions.
fn read_key_file(path: &Path, source: KeySource) -> CustosResult<SigningKey> {
    check_key_file_permissions(path)?;

    let mut bytes = fs::read(path).map_err(|e| CustosError::KeyInit {
        reason: format!("failed to read key file '{}': {}", path.display(), e),
    })?;
    let key = SigningKey::from_bytes(&bytes, source);
    use zeroize::Zeroize;
    bytes.zeroize();
    key
}

/// A key file readable by group or world is rejected outright.
#[cfg(unix)]
fn check_key_file_permissions(path: &Path) -> CustosResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| CustosError::KeyInit {
        reason: format!("key file '{}' not accessible: {}", path.display(), e),
    })?;
    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(CustosError::KeyInit {
            reason: format!(
                "key file '{}' has mode {:o}; must be 0600 or 0400",
                path.display(),
                mode
            ),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_key_file_permissions(_path: &Path) -> CustosResult<()> {
    Ok(())
}

/// Write key bytes with owner-only permissions, synced to disk.
#[cfg(unix)]
fn write_key_file(path: &Path, bytes: &[u8]) -> CustosResult<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| CustosError::KeyInit {
            reason: format!("failed to create key file '{}': {}", path.display(), e),
        })?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| CustosError::KeyInit {
            reason: format!("failed to write key file '{}': {}", path.display(), e),
        })
}

#[cfg(not(unix))]
fn write_key_file(path: &Path, bytes: &[u8]) -> CustosResult<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| CustosError::KeyInit {
            reason: format!("failed to create key file '{}': {}", path.display(), e),
        })?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| CustosError::KeyInit {
            reason: format!("failed to write key file '{}': {}", path.display(), e),
        })
}
