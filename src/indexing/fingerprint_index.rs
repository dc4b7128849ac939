//! Inverted fingerprint indices
//!
//! For one hashed dataset, maps each fingerprint to the positions of every
//! record carrying it, separately per match category. Fingerprints are not
//! assumed unique within a dataset: all owners are kept, in input order.
//! Records borrow from the dataset, so building an index copies no hashes.

use crate::algorithms::fingerprint::Fingerprint;
use crate::config::PhoneMatchPolicy;
use crate::hashing::HashedRecord;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of identifying evidence a fingerprint provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Phone,
    Email,
    PersonalInfo,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Phone, Category::Email, Category::PersonalInfo];
    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Category::Phone => 0,
            Category::Email => 1,
            Category::PersonalInfo => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Phone => "Phone",
            Category::Email => "Email",
            Category::PersonalInfo => "Personal Info",
        }
    }

    /// The record's non-empty fingerprints for this category, each tagged
    /// with the index lane it belongs to under `policy`
    pub fn keyed_fingerprints<'r>(
        self,
        record: &'r HashedRecord,
        policy: PhoneMatchPolicy,
    ) -> SmallVec<[(MatchKey, &'r Fingerprint); 3]> {
        match self {
            Category::Phone => record
                .phones()
                .map(|(slot, fp)| {
                    let lane = match policy {
                        PhoneMatchPolicy::AnySlot => 0,
                        PhoneMatchPolicy::Positional => slot.index() as u8,
                    };
                    (MatchKey::new(self, lane), fp)
                })
                .collect(),
            Category::Email => record
                .email_hash
                .iter()
                .map(|fp| (MatchKey::new(self, 0), fp))
                .collect(),
            Category::PersonalInfo => record
                .personal_info_hash
                .iter()
                .map(|fp| (MatchKey::new(self, 0), fp))
                .collect(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One independently intersected index: a category and a lane within it.
///
/// Only positional phone matching uses more than one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey {
    pub category: Category,
    pub lane: u8,
}

impl MatchKey {
    pub fn new(category: Category, lane: u8) -> Self {
        Self { category, lane }
    }
}

/// Fingerprint → positions of the records that carry it
#[derive(Debug, Clone, Default)]
pub struct FingerprintIndex<'a> {
    postings: IndexMap<&'a str, SmallVec<[usize; 2]>, ahash::RandomState>,
}

impl<'a> FingerprintIndex<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the record at `position` carries `fingerprint`.
    ///
    /// Positions must be inserted in non-decreasing order; a record listed
    /// twice for the same fingerprint is kept once.
    pub fn insert(&mut self, fingerprint: &'a Fingerprint, position: usize) {
        let owners = self.postings.entry(fingerprint.as_str()).or_default();
        if owners.last() != Some(&position) {
            owners.push(position);
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<&[usize]> {
        self.postings.get(fingerprint).map(SmallVec::as_slice)
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.postings.contains_key(fingerprint)
    }

    /// Fingerprints in first-seen order with their owners
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &[usize])> + '_ {
        self.postings.iter().map(|(fp, owners)| (*fp, owners.as_slice()))
    }

    /// Number of distinct fingerprints
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// Every index needed to match one hashed dataset
#[derive(Debug, Clone)]
pub struct IndexSet<'a> {
    records: &'a [HashedRecord],
    policy: PhoneMatchPolicy,
    indices: BTreeMap<MatchKey, FingerprintIndex<'a>>,
}

impl<'a> IndexSet<'a> {
    /// Index `records` in one pass. Empty fingerprints are never indexed.
    pub fn build(records: &'a [HashedRecord], policy: PhoneMatchPolicy) -> Self {
        let mut indices: BTreeMap<MatchKey, FingerprintIndex<'a>> = BTreeMap::new();
        for (position, record) in records.iter().enumerate() {
            for category in Category::ALL {
                for (key, fp) in category.keyed_fingerprints(record, policy) {
                    indices.entry(key).or_default().insert(fp, position);
                }
            }
        }
        Self {
            records,
            policy,
            indices,
        }
    }

    pub fn records(&self) -> &'a [HashedRecord] {
        self.records
    }

    pub fn policy(&self) -> PhoneMatchPolicy {
        self.policy
    }

    pub fn index(&self, key: MatchKey) -> Option<&FingerprintIndex<'a>> {
        self.indices.get(&key)
    }

    /// Indices in key order
    pub fn iter(&self) -> impl Iterator<Item = (MatchKey, &FingerprintIndex<'a>)> + '_ {
        self.indices.iter().map(|(key, index)| (*key, index))
    }

    /// Distinct fingerprints indexed for `category`, across its lanes
    pub fn fingerprint_count(&self, category: Category) -> usize {
        self.indices
            .iter()
            .filter(|(key, _)| key.category == category)
            .map(|(_, index)| index.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(value: &str) -> Option<Fingerprint> {
        Fingerprint::of(value)
    }

    fn record(pseudonym: &str, phones: [&str; 3], email: &str) -> HashedRecord {
        HashedRecord {
            pseudonym: pseudonym.to_string(),
            phone_hashes: phones.map(fp),
            personal_info_hash: None,
            email_hash: fp(email),
        }
    }

    #[test]
    fn test_duplicates_across_records_kept() {
        let records = vec![
            record("a", ["p1", "", ""], "shared@x.com"),
            record("b", ["", "", ""], "other@x.com"),
            record("c", ["", "", ""], "shared@x.com"),
        ];
        let set = IndexSet::build(&records, PhoneMatchPolicy::AnySlot);
        let email = set.index(MatchKey::new(Category::Email, 0)).unwrap();
        let shared = fp("shared@x.com").unwrap();
        assert_eq!(email.get(shared.as_str()), Some(&[0, 2][..]));
        assert_eq!(email.len(), 2);
    }

    #[test]
    fn test_empty_fingerprints_not_indexed() {
        let records = vec![record("a", ["", "", ""], "")];
        let set = IndexSet::build(&records, PhoneMatchPolicy::AnySlot);
        assert_eq!(set.iter().count(), 0);
        assert_eq!(set.fingerprint_count(Category::Phone), 0);
        assert!(set.index(MatchKey::new(Category::Email, 0)).is_none());
    }

    #[test]
    fn test_any_slot_merges_phone_lanes() {
        let records = vec![
            record("a", ["p1", "p2", ""], ""),
            record("b", ["p2", "", "p3"], ""),
        ];
        let set = IndexSet::build(&records, PhoneMatchPolicy::AnySlot);
        let phones = set.index(MatchKey::new(Category::Phone, 0)).unwrap();
        assert_eq!(phones.len(), 3);
        assert_eq!(phones.get(fp("p2").unwrap().as_str()), Some(&[0, 1][..]));
        assert!(set.index(MatchKey::new(Category::Phone, 1)).is_none());
    }

    #[test]
    fn test_positional_keeps_lanes_apart() {
        let records = vec![
            record("a", ["p1", "p2", ""], ""),
            record("b", ["p2", "", "p3"], ""),
        ];
        let set = IndexSet::build(&records, PhoneMatchPolicy::Positional);
        let lane0 = set.index(MatchKey::new(Category::Phone, 0)).unwrap();
        let lane1 = set.index(MatchKey::new(Category::Phone, 1)).unwrap();
        let p2 = fp("p2").unwrap();
        assert_eq!(lane0.get(p2.as_str()), Some(&[1][..]));
        assert_eq!(lane1.get(p2.as_str()), Some(&[0][..]));
        assert_eq!(set.fingerprint_count(Category::Phone), 4);
    }

    #[test]
    fn test_same_record_listed_once() {
        let records = vec![record("a", ["p1", "p1", "p1"], "")];
        let set = IndexSet::build(&records, PhoneMatchPolicy::AnySlot);
        let phones = set.index(MatchKey::new(Category::Phone, 0)).unwrap();
        assert_eq!(phones.get(fp("p1").unwrap().as_str()), Some(&[0][..]));
    }
}
