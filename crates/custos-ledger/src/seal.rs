//! Keyed hashing and digest comparison.
//!
//! Every hash in the ledger is an HMAC-SHA256 under the current signing
//! key, rendered as lowercase hex. Digest comparison on the verification
//! path is constant-time so the integrity check itself does not leak where
//! two digests first differ.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::entry::ChainEntry;

type HmacSha256 = Hmac<Sha256>;

/// Compute the keyed digest of raw bytes.
///
/// Returns a lowercase 64-character hex string.
pub fn keyed_digest(key: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Compute the keyed digest of a chain entry with `chain_hash` cleared.
///
/// The cleared-field serialization is what the stored `chain_hash` commits
/// to, so recomputing it during verification reproduces the signing-time
/// bytes exactly.
///
/// # Panics
///
/// Panics if the entry cannot be serialized to JSON — which cannot happen
/// for the plain-data `ChainEntry` type.
pub fn entry_digest(key: &[u8], entry: &ChainEntry) -> String {
    let unsealed = ChainEntry {
        chain_hash: String::new(),
        ..entry.clone()
    };
    let bytes =
        serde_json::to_vec(&unsealed).expect("ChainEntry must always be serializable to JSON");
    keyed_digest(key, &bytes)
}

/// Constant-time equality of two hex digests.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}
