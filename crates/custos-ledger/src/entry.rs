//! Chain entry and witness record types.
//!
//! `ChainEntry` is the integrity record the protector keeps per audited
//! event; `WitnessRecord` is the independently-appended line that anchors
//! each entry outside the chain file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One integrity record, 1:1 with an audited event.
///
/// Entries are totally ordered by `index` with no gaps. Each entry commits
/// to its predecessor through `previous_hash`, so editing, inserting, or
/// deleting any past entry breaks the recomputed linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEntry {
    /// 0-based position in the chain; always equals the entry's slot.
    pub index: u64,

    /// Copied from the event at signing time.
    pub timestamp: DateTime<Utc>,

    /// Keyed hash of the serialized event.
    pub event_hash: String,

    /// `chain_hash` of the previous entry; empty string at index 0.
    pub previous_hash: String,

    /// Keyed hash of this entry, computed with this field cleared.
    pub chain_hash: String,
}

/// One line in the witness file: `RFC3339-timestamp|index|chain_hash`.
///
/// The witness file lives apart from the chain file, so replacing the
/// whole chain leaves a witness trail the attacker did not regenerate.
#[derive(Debug, Clone, PartialEq)]
pub struct WitnessRecord {
    pub timestamp: DateTime<Utc>,
    pub index: u64,
    pub chain_hash: String,
}

impl WitnessRecord {
    /// Build the witness record for a chain entry.
    pub fn for_entry(entry: &ChainEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            index: entry.index,
            chain_hash: entry.chain_hash.clone(),
        }
    }

    /// Render the single-line wire form (no trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}",
            self.timestamp.to_rfc3339(),
            self.index,
            self.chain_hash
        )
    }

    /// Parse one witness line. The error string describes what was wrong,
    /// suitable for inclusion in an issue list.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split('|');
        let (timestamp, index, chain_hash) = match (parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(i), Some(h)) if parts.next().is_none() => (t, i, h),
            _ => return Err("invalid format, expected timestamp|index|chain_hash".to_string()),
        };

        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| format!("invalid timestamp: {}", e))?
            .with_timezone(&Utc);
        let index: u64 = index
            .parse()
            .map_err(|e| format!("invalid index: {}", e))?;

        Ok(Self {
            timestamp,
            index,
            chain_hash: chain_hash.to_string(),
        })
    }
}
