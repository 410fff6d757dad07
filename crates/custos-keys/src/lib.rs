//! # custos-keys
//!
//! Signing-key material and key management for the custos audit engine.
//!
//! The key manager resolves the symmetric signing key from a
//! priority-ordered set of sources (explicit value, explicit file path,
//! default file generated on first run), persists it with owner-only
//! permissions, and performs rotation with a timestamped backup of the
//! old key file. Key bytes are overwritten in memory on drop.

pub mod key;
pub mod manager;

pub use key::{KeySource, SigningKey, KEY_SIZE};
pub use manager::{
    KeyConfig, KeyManager, KeyMetadata, RotationResult, DEFAULT_KEY_FILE_NAME, KEY_ENV_VAR,
    KEY_FILE_ENV_VAR,
};
