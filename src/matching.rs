//! Cross-dataset matching
//!
//! Intersects the indices of two hashed datasets key by key. Every pairing
//! of records that share a fingerprint becomes evidence for their pseudonym
//! pair; evidence from all categories accumulates into one entry per pair.
//! No scoring or thresholding happens here. Deciding whether a pair is the
//! same person is left to whoever reads the report.

use crate::config::MatchConfig;
use crate::hashing::HashedRecord;
use crate::indexing::{Category, IndexSet};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors that abort matching before any pair is produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Hashed dataset {0} has no records")]
    EmptyDataset(u8),
}

/// `(pseudonym from dataset 1, pseudonym from dataset 2)`
pub type PseudonymPair<'a> = (&'a str, &'a str);

/// Which categories matched for one pseudonym pair, and on what
///
/// Evidence only grows: once a category matched it stays matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchEvidence<'a> {
    matched: [SmallVec<[&'a str; 1]>; Category::COUNT],
}

impl<'a> MatchEvidence<'a> {
    pub fn is_match(&self, category: Category) -> bool {
        !self.matched[category.index()].is_empty()
    }

    /// Distinct fingerprints that matched for `category`, first match first
    pub fn matched(&self, category: Category) -> &[&'a str] {
        &self.matched[category.index()]
    }

    fn add(&mut self, category: Category, fingerprint: &'a str) {
        let set = &mut self.matched[category.index()];
        if !set.contains(&fingerprint) {
            set.push(fingerprint);
        }
    }
}

/// Evidence for every matched pair, in first-match order
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome<'a> {
    evidence: IndexMap<PseudonymPair<'a>, MatchEvidence<'a>, ahash::RandomState>,
}

impl<'a> MatchOutcome<'a> {
    pub fn len(&self) -> usize {
        self.evidence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty()
    }

    pub fn get(&self, pseudonym_1: &'a str, pseudonym_2: &'a str) -> Option<&MatchEvidence<'a>> {
        self.evidence.get(&(pseudonym_1, pseudonym_2))
    }

    pub fn iter(&self) -> impl Iterator<Item = (PseudonymPair<'a>, &MatchEvidence<'a>)> + '_ {
        self.evidence.iter().map(|(pair, evidence)| (*pair, evidence))
    }

    pub fn summary(&self) -> MatchSummary {
        let mut per_category = [0; Category::COUNT];
        for evidence in self.evidence.values() {
            for category in Category::ALL {
                if evidence.is_match(category) {
                    per_category[category.index()] += 1;
                }
            }
        }
        MatchSummary {
            pairs: self.evidence.len(),
            per_category,
        }
    }

    fn record(&mut self, pair: PseudonymPair<'a>, category: Category, fingerprint: &'a str) {
        self.evidence.entry(pair).or_default().add(category, fingerprint);
    }
}

/// Match counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    /// Distinct pseudonym pairs with any evidence
    pub pairs: usize,
    pub per_category: [usize; Category::COUNT],
}

impl MatchSummary {
    /// Pairs with evidence in `category`
    pub fn count(&self, category: Category) -> usize {
        self.per_category[category.index()]
    }
}

impl fmt::Display for MatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total unique matched pairs: {}", self.pairs)?;
        for category in Category::ALL {
            writeln!(f, "{} Match: {}", category.label(), self.count(category))?;
        }
        Ok(())
    }
}

/// Intersect two index sets.
///
/// Both sets must be built with the same phone policy. Every fingerprint of
/// `left` present under the same key in `right` contributes the full
/// cartesian product of their owners.
pub fn match_index_sets<'a>(left: &IndexSet<'a>, right: &IndexSet<'a>) -> MatchOutcome<'a> {
    debug_assert_eq!(left.policy(), right.policy());

    let mut outcome = MatchOutcome::default();
    let (left_records, right_records) = (left.records(), right.records());

    for (key, left_index) in left.iter() {
        let Some(right_index) = right.index(key) else {
            continue;
        };
        let mut shared = 0usize;
        for (fingerprint, left_owners) in left_index.iter() {
            let Some(right_owners) = right_index.get(fingerprint) else {
                continue;
            };
            shared += 1;
            for &l in left_owners {
                for &r in right_owners {
                    let pair = (
                        left_records[l].pseudonym.as_str(),
                        right_records[r].pseudonym.as_str(),
                    );
                    outcome.record(pair, key.category, fingerprint);
                }
            }
        }
        debug!(category = %key.category, lane = key.lane, shared, "intersected index");
    }
    outcome
}

/// Index both datasets and match them.
///
/// Fails without matching anything if either dataset is empty.
pub fn match_datasets<'a>(
    left: &'a [HashedRecord],
    right: &'a [HashedRecord],
    config: &MatchConfig,
) -> Result<MatchOutcome<'a>, MatchError> {
    if left.is_empty() {
        return Err(MatchError::EmptyDataset(1));
    }
    if right.is_empty() {
        return Err(MatchError::EmptyDataset(2));
    }

    let left_index = IndexSet::build(left, config.phone_policy);
    let right_index = IndexSet::build(right, config.phone_policy);
    Ok(match_index_sets(&left_index, &right_index))
}
