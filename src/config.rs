use crate::algorithms::phone::Region;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Batches at or above this size are hashed on the rayon pool.
///
/// Smaller batches are hashed inline; thread coordination costs more than
/// normalizing a handful of rows.
pub const PARALLEL_THRESHOLD: usize = 256;

/// Settings for the normalize-and-fingerprint pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    /// Region national phone numbers are interpreted in.
    pub region: Region,
    /// Hash large batches in parallel. Output order and counters are the
    /// same either way.
    pub parallel: bool,
    /// Records pulled from the reader per batch.
    pub batch_size: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            region: Region::US,
            parallel: true,
            batch_size: 4096,
        }
    }
}

/// How phone fingerprints from the two datasets are paired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhoneMatchPolicy {
    /// Any slot of one record may match any slot of the other.
    #[default]
    AnySlot,
    /// Slot N only matches slot N.
    Positional,
}

impl fmt::Display for PhoneMatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhoneMatchPolicy::AnySlot => f.write_str("any-slot"),
            PhoneMatchPolicy::Positional => f.write_str("positional"),
        }
    }
}

impl FromStr for PhoneMatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any-slot" | "any_slot" | "any" => Ok(PhoneMatchPolicy::AnySlot),
            "positional" | "strict" => Ok(PhoneMatchPolicy::Positional),
            other => Err(format!("unknown phone match policy '{other}'")),
        }
    }
}

/// Settings for the matching pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub phone_policy: PhoneMatchPolicy,
    /// Separator for multi-valued cells in the match report.
    pub list_delimiter: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            phone_policy: PhoneMatchPolicy::AnySlot,
            list_delimiter: "|".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_round_trips_through_display() {
        for policy in [PhoneMatchPolicy::AnySlot, PhoneMatchPolicy::Positional] {
            assert_eq!(policy.to_string().parse::<PhoneMatchPolicy>().unwrap(), policy);
        }
        assert!("sideways".parse::<PhoneMatchPolicy>().is_err());
    }

    #[test]
    fn test_defaults() {
        let hash = HashConfig::default();
        assert_eq!(hash.region, Region::US);
        assert!(hash.batch_size >= PARALLEL_THRESHOLD);
        assert_eq!(MatchConfig::default().list_delimiter, "|");
    }
}
