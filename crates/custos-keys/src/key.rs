//! Signing-key material.
//!
//! `SigningKey` owns the 32-byte symmetric secret used to seal chain
//! entries. The bytes are overwritten in memory when the key is dropped,
//! so rotation and shutdown never leave key material behind for crash
//! dumps or swap to pick up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use custos_contracts::{CustosError, CustosResult};

/// Signing key length in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Where a signing key was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Hex-encoded key passed directly through configuration.
    Environment,
    /// A key file at a path passed through configuration.
    EnvironmentFile,
    /// The default key file inside the audit directory.
    DefaultFile,
    /// Freshly generated because no default key file existed yet.
    Generated,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeySource::Environment => "environment",
            KeySource::EnvironmentFile => "environment_file",
            KeySource::DefaultFile => "default_file",
            KeySource::Generated => "generated",
        };
        f.write_str(name)
    }
}

/// A fixed-length symmetric signing key, zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    bytes: [u8; KEY_SIZE],
    #[zeroize(skip)]
    source: KeySource,
    #[zeroize(skip)]
    created_at: DateTime<Utc>,
}

impl SigningKey {
    /// Generate a new key from the operating system's CSPRNG.
    pub fn generate(source: KeySource) -> Self {
        use rand::RngCore;

        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self {
            bytes,
            source,
            created_at: Utc::now(),
        }
    }

    /// Build a key from raw bytes, rejecting anything but exactly
    /// `KEY_SIZE` bytes.
    pub fn from_bytes(bytes: &[u8], source: KeySource) -> CustosResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CustosError::KeyInit {
                reason: format!(
                    "signing key must be {} bytes, got {}",
                    KEY_SIZE,
                    bytes.len()
                ),
            });
        }
        let mut fixed = [0u8; KEY_SIZE];
        fixed.copy_from_slice(bytes);
        Ok(Self {
            bytes: fixed,
            source,
            created_at: Utc::now(),
        })
    }

    /// Decode a hex-encoded key.
    pub fn from_hex(encoded: &str, source: KeySource) -> CustosResult<Self> {
        let mut decoded = hex::decode(encoded.trim()).map_err(|e| CustosError::KeyInit {
            reason: format!("signing key is not valid hex: {}", e),
        })?;
        let key = Self::from_bytes(&decoded, source);
        decoded.zeroize();
        key
    }

    /// The raw key bytes, for feeding the keyed-hash construction.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// First 4 bytes as hex — enough to identify a key in operator output
    /// without exposing usable material.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.bytes[..4])
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Debug for SigningKey {
    /// Never prints key bytes — only the fingerprint and provenance.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("fingerprint", &self.fingerprint())
            .field("source", &self.source)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
