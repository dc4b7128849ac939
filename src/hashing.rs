//! Normalize-and-fingerprint pass over a raw record stream
//!
//! Resolves each record's logical fields, normalizes them, and turns them
//! into a [`HashedRecord`]. Phone values that are present but unusable are
//! reported on a side channel as [`BadPhoneRecord`]s. Counters are
//! accumulated in a [`HashStats`] returned to the caller.

use crate::algorithms::fingerprint::Fingerprint;
use crate::algorithms::normalize::{initial, normalize_address, normalize_state};
use crate::algorithms::phone::{normalize_phone, PhoneFailure};
use crate::config::{HashConfig, PARALLEL_THRESHOLD};
use crate::schema::{FieldSchema, LogicalField, PhoneSlot, RawRecord};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::convert::Infallible;
use std::fmt;
use tracing::debug;

// ============================================================================
// Records
// ============================================================================

/// The unit of exchange between the two parties
///
/// Only the pseudonym is clear text. A `None` fingerprint means the field
/// had no usable value; it is never hashed and never matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashedRecord {
    pub pseudonym: String,
    pub phone_hashes: [Option<Fingerprint>; 3],
    pub personal_info_hash: Option<Fingerprint>,
    pub email_hash: Option<Fingerprint>,
}

impl HashedRecord {
    pub fn new(pseudonym: impl Into<String>) -> Self {
        Self {
            pseudonym: pseudonym.into(),
            ..Default::default()
        }
    }

    pub fn phone_hash(&self, slot: PhoneSlot) -> Option<&Fingerprint> {
        self.phone_hashes[slot.index()].as_ref()
    }

    /// Non-empty phone fingerprints with the slot they came from
    pub fn phones(&self) -> impl Iterator<Item = (PhoneSlot, &Fingerprint)> {
        PhoneSlot::ALL
            .into_iter()
            .filter_map(|slot| self.phone_hash(slot).map(|fp| (slot, fp)))
    }
}

/// A phone value that was present but could not be canonicalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadPhoneRecord {
    pub pseudonym: String,
    /// The value exactly as it appeared in the input
    pub original_input: String,
    pub slot: PhoneSlot,
    pub failure: PhoneFailure,
    /// The whole input row, for manual review
    pub raw: RawRecord,
}

impl BadPhoneRecord {
    pub fn reason(&self) -> String {
        self.failure.to_string()
    }
}

// ============================================================================
// Fingerprint builder
// ============================================================================

/// Normalized values of one record, ready to be fingerprinted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFields {
    pub pseudonym: String,
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub state: String,
    /// Canonical phone per slot; empty when blank or invalid
    pub phones: [String; 3],
    pub email: String,
}

impl NormalizedFields {
    /// City, state, last name and first initial, concatenated without
    /// separators
    pub fn personal_info(&self) -> String {
        let initial = initial(&self.first_name);
        let mut out = String::with_capacity(
            self.city.len() + self.state.len() + self.last_name.len() + initial.len(),
        );
        out.push_str(&self.city);
        out.push_str(&self.state);
        out.push_str(&self.last_name);
        out.push_str(initial);
        out
    }

    /// Build the hashed record. The pseudonym is carried verbatim.
    pub fn fingerprint(&self) -> HashedRecord {
        HashedRecord {
            pseudonym: self.pseudonym.clone(),
            phone_hashes: [
                Fingerprint::of(&self.phones[0]),
                Fingerprint::of(&self.phones[1]),
                Fingerprint::of(&self.phones[2]),
            ],
            personal_info_hash: Fingerprint::of(&self.personal_info()),
            email_hash: Fingerprint::of(&self.email),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// How one phone slot of one record turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneStatus {
    Blank,
    Invalid,
    Valid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhoneSlotStats {
    pub blank: usize,
    pub invalid: usize,
    pub success: usize,
}

impl PhoneSlotStats {
    fn record(&mut self, status: PhoneStatus) {
        match status {
            PhoneStatus::Blank => self.blank += 1,
            PhoneStatus::Invalid => self.invalid += 1,
            PhoneStatus::Valid => self.success += 1,
        }
    }
}

/// Run-level counters for a hashing pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashStats {
    pub total_rows: usize,
    pub hashed_rows: usize,
    /// Rows dropped because the pseudonym was blank
    pub skipped_rows: usize,
    pub bad_phone_entries: usize,
    pub phones: [PhoneSlotStats; 3],
}

impl HashStats {
    pub fn phone(&self, slot: PhoneSlot) -> &PhoneSlotStats {
        &self.phones[slot.index()]
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        self.total_rows += 1;
        match outcome {
            RecordOutcome::Skipped => self.skipped_rows += 1,
            RecordOutcome::Hashed(entry) => {
                self.hashed_rows += 1;
                self.bad_phone_entries += entry.bad_phones.len();
                for (stats, status) in self.phones.iter_mut().zip(entry.phone_status) {
                    stats.record(status);
                }
            }
        }
    }
}

impl fmt::Display for HashStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total rows processed: {}", self.total_rows)?;
        writeln!(f, "Rows hashed and written to output: {}", self.hashed_rows)?;
        writeln!(f, "Rows skipped due to blank pseudonym: {}", self.skipped_rows)?;
        writeln!(f, "Bad phone entries: {}", self.bad_phone_entries)?;
        writeln!(f, "Phone number processing summary:")?;
        for slot in PhoneSlot::ALL {
            let s = self.phone(slot);
            writeln!(
                f,
                "- {}: {} success, {} blank, {} invalid",
                slot.label(),
                s.success,
                s.blank,
                s.invalid
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Hasher
// ============================================================================

/// Result of hashing a single raw record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Blank pseudonym; nothing emitted
    Skipped,
    Hashed(HashedEntry),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedEntry {
    pub record: HashedRecord,
    pub phone_status: [PhoneStatus; 3],
    pub bad_phones: SmallVec<[BadPhoneRecord; 1]>,
}

/// Destination for the hashing pass outputs
///
/// Records arrive in input order, each followed by its bad-phone entries.
pub trait HashSink {
    type Error;

    fn write_hashed(&mut self, record: &HashedRecord) -> Result<(), Self::Error>;

    /// Bad-phone entries are optional output; the default drops them.
    fn write_bad_phone(&mut self, _bad: &BadPhoneRecord) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// In-memory result of a hashing pass
#[derive(Debug, Clone, Default)]
pub struct HashedDataset {
    pub records: Vec<HashedRecord>,
    pub bad_phones: Vec<BadPhoneRecord>,
}

impl HashSink for HashedDataset {
    type Error = Infallible;

    fn write_hashed(&mut self, record: &HashedRecord) -> Result<(), Infallible> {
        self.records.push(record.clone());
        Ok(())
    }

    fn write_bad_phone(&mut self, bad: &BadPhoneRecord) -> Result<(), Infallible> {
        self.bad_phones.push(bad.clone());
        Ok(())
    }
}

/// Drives field resolution, normalization and fingerprinting over records
#[derive(Debug, Clone)]
pub struct DatasetHasher {
    schema: FieldSchema,
    config: HashConfig,
}

impl DatasetHasher {
    pub fn new(schema: FieldSchema, config: HashConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// Resolve and normalize one record, with the per-slot phone results
    pub fn normalize(
        &self,
        raw: &RawRecord,
    ) -> (NormalizedFields, [Result<(), PhoneFailure>; 3]) {
        let resolve = |field| self.schema.resolve(raw, field);

        let mut fields = NormalizedFields {
            pseudonym: resolve(LogicalField::Pseudonym),
            first_name: resolve(LogicalField::FirstName),
            last_name: resolve(LogicalField::LastName),
            city: normalize_address(&resolve(LogicalField::City)),
            state: normalize_state(&resolve(LogicalField::State)),
            phones: Default::default(),
            email: resolve(LogicalField::Email),
        };

        let mut results: [Result<(), PhoneFailure>; 3] = [Ok(()), Ok(()), Ok(())];
        for slot in PhoneSlot::ALL {
            match normalize_phone(&resolve(slot.field()), self.config.region) {
                Ok(canonical) => fields.phones[slot.index()] = canonical,
                Err(failure) => results[slot.index()] = Err(failure),
            }
        }
        (fields, results)
    }

    /// Hash one raw record
    pub fn hash_record(&self, raw: &RawRecord) -> RecordOutcome {
        if self.schema.resolve(raw, LogicalField::Pseudonym).is_empty() {
            return RecordOutcome::Skipped;
        }

        let (fields, phone_results) = self.normalize(raw);
        let mut phone_status = [PhoneStatus::Valid; 3];
        let mut bad_phones = SmallVec::new();

        for (slot, result) in PhoneSlot::ALL.into_iter().zip(phone_results) {
            phone_status[slot.index()] = match result {
                Ok(()) => PhoneStatus::Valid,
                Err(PhoneFailure::Blank) => PhoneStatus::Blank,
                Err(failure) => {
                    bad_phones.push(BadPhoneRecord {
                        pseudonym: fields.pseudonym.clone(),
                        original_input: self
                            .schema
                            .resolve_raw(raw, slot.field())
                            .unwrap_or_default()
                            .to_string(),
                        slot,
                        failure,
                        raw: raw.clone(),
                    });
                    PhoneStatus::Invalid
                }
            };
        }

        RecordOutcome::Hashed(HashedEntry {
            record: fields.fingerprint(),
            phone_status,
            bad_phones,
        })
    }

    /// Hash a record stream into `sink`, in input order.
    ///
    /// Row-level defects are counted, never fatal. The first reader or sink
    /// error stops the pass. Records are pulled `batch_size` at a time and
    /// only written once their whole batch has been read, so a reader error
    /// discards the rows already read in the failing batch. Batches written
    /// before the error stay written.
    pub fn hash_stream<I, E, S>(&self, records: I, sink: &mut S) -> Result<HashStats, E>
    where
        I: IntoIterator<Item = Result<RawRecord, E>>,
        S: HashSink,
        E: From<S::Error>,
    {
        let batch_size = self.config.batch_size.max(1);
        let mut stats = HashStats::default();
        let mut records = records.into_iter();
        let mut batch = Vec::with_capacity(batch_size);

        loop {
            batch.clear();
            for record in records.by_ref().take(batch_size) {
                batch.push(record?);
            }
            if batch.is_empty() {
                break;
            }
            for outcome in self.hash_batch(&batch) {
                stats.record(&outcome);
                emit(outcome, sink)?;
            }
        }

        debug!(
            total = stats.total_rows,
            hashed = stats.hashed_rows,
            skipped = stats.skipped_rows,
            "hashing pass finished"
        );
        Ok(stats)
    }

    /// Hash in-memory records
    pub fn hash_records<I>(&self, records: I) -> (HashedDataset, HashStats)
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut dataset = HashedDataset::default();
        match self.hash_stream(records.into_iter().map(Ok::<_, Infallible>), &mut dataset) {
            Ok(stats) => (dataset, stats),
            Err(never) => match never {},
        }
    }

    fn hash_batch(&self, batch: &[RawRecord]) -> Vec<RecordOutcome> {
        if self.config.parallel && batch.len() >= PARALLEL_THRESHOLD {
            batch.par_iter().map(|raw| self.hash_record(raw)).collect()
        } else {
            batch.iter().map(|raw| self.hash_record(raw)).collect()
        }
    }
}

fn emit<S: HashSink>(outcome: RecordOutcome, sink: &mut S) -> Result<(), S::Error> {
    match outcome {
        RecordOutcome::Skipped => {
            debug!("skipping row with blank pseudonym");
            Ok(())
        }
        RecordOutcome::Hashed(entry) => {
            sink.write_hashed(&entry.record)?;
            for bad in &entry.bad_phones {
                debug!(
                    pseudonym = %bad.pseudonym,
                    slot = %bad.slot,
                    reason = %bad.failure,
                    "invalid phone number"
                );
                sink.write_bad_phone(bad)?;
            }
            Ok(())
        }
    }
}
