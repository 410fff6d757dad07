//! Error types for the custos audit engine.
//!
//! All fallible operations across the custos crates return `CustosResult<T>`.
//! Two variants carry policy weight: `KeyInit` means the integrity layer
//! could not be brought up at all and must not be used, and `SaveFailed`
//! means an audit entry could not be durably persisted after exhausting
//! retries — callers branch on it to decide whether to halt the operation
//! that was about to be audited.

use thiserror::Error;

/// The unified error type for the custos audit engine.
#[derive(Debug, Error)]
pub enum CustosError {
    /// No usable signing key could be resolved, or a configured source was
    /// present but invalid. Fatal: the protector must not start unsigned.
    #[error("signing key initialization failed: {reason}")]
    KeyInit { reason: String },

    /// Chain or witness persistence failed after exhausting all retries.
    ///
    /// Distinguished from ordinary I/O errors so callers can halt the
    /// protected operation rather than continue without audit coverage.
    #[error("audit save failed: {operation} did not succeed after {attempts} attempts: {reason}")]
    SaveFailed {
        operation: String,
        attempts: u32,
        reason: String,
    },

    /// An ordinary I/O failure while reading or writing chain state.
    #[error("chain persistence error: {reason}")]
    ChainPersistence { reason: String },

    /// A value could not be serialized or deserialized.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// A configuration value is missing or malformed.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The audit log file could not be opened or read for review.
    #[error("audit log access error: {reason}")]
    LogAccess { reason: String },

    /// Log archival failed, or an archived copy did not verify.
    #[error("archive error: {reason}")]
    Archive { reason: String },
}

impl CustosError {
    /// Returns true if this error means an audit entry was not durably
    /// persisted and the caller should halt the operation being audited.
    pub fn is_save_failure(&self) -> bool {
        matches!(self, CustosError::SaveFailed { .. })
    }
}

/// Convenience alias used throughout the custos crates.
pub type CustosResult<T> = Result<T, CustosError>;
