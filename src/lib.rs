//! hashmatch - privacy-preserving record linkage
//!
//! Two parties each turn their contact records into unsalted SHA-256
//! fingerprints of normalized identifiers, exchange only the fingerprints,
//! and find which pseudonyms on either side share a phone, an email or a
//! personal-info key.
//!
//! # Features
//! - Column-synonym resolution for heterogeneous exports
//! - E.164 phone canonicalization with per-slot failure reporting
//! - Streaming, batch-parallel hashing with deterministic output order
//! - Inverted-index matching that keeps every owner of a duplicate hash
//!
//! # Example
//!
//! ```
//! use hashmatch::config::{HashConfig, MatchConfig};
//! use hashmatch::hashing::DatasetHasher;
//! use hashmatch::matching::match_datasets;
//! use hashmatch::schema::{FieldSchema, RawRecord};
//!
//! let hasher = DatasetHasher::new(FieldSchema::standard(), HashConfig::default());
//!
//! let left: RawRecord = [("pseudonym", "alice123"), ("Email", "ALICE@x.com ")]
//!     .into_iter()
//!     .collect();
//! let right: RawRecord = [("pseudonym", "a_9"), ("email", "alice@x.com")]
//!     .into_iter()
//!     .collect();
//!
//! let (left, _) = hasher.hash_records([left]);
//! let (right, _) = hasher.hash_records([right]);
//! let outcome = match_datasets(&left.records, &right.records, &MatchConfig::default()).unwrap();
//! assert_eq!(outcome.len(), 1);
//! ```

pub mod algorithms;
pub mod config;
pub mod hashing;
pub mod indexing;
pub mod matching;
pub mod schema;
pub mod tabular;

pub use algorithms::{Fingerprint, PhoneFailure, Region};
pub use config::{HashConfig, MatchConfig, PhoneMatchPolicy};
pub use hashing::{DatasetHasher, HashSink, HashStats, HashedRecord};
pub use matching::{match_datasets, MatchOutcome, MatchSummary};
pub use schema::{FieldSchema, LogicalField, RawRecord};

use std::path::Path;
use tabular::{read_hashed_dataset, write_match_report_file, CsvHashSink, RawRecordReader};
use tracing::info;

// ============================================================================
// Errors
// ============================================================================

/// Any failure a pipeline stage can report
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),

    #[error(transparent)]
    Tabular(#[from] tabular::TabularError),

    #[error(transparent)]
    Match(#[from] matching::MatchError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ============================================================================
// File pipelines
// ============================================================================

/// Hash the raw CSV at `input` into a hashed CSV at `output`.
///
/// Phone values that fail to canonicalize are written to `bad_records`
/// when given, alongside every original column of their row. Both files are
/// flushed before returning.
pub fn hash_csv(
    input: &Path,
    output: &Path,
    bad_records: Option<&Path>,
    schema: FieldSchema,
    config: HashConfig,
) -> Result<HashStats> {
    let reader = RawRecordReader::open(input)?;
    let headers = reader.headers().to_vec();
    info!(input = %input.display(), columns = headers.len(), "hashing");

    let mut sink = CsvHashSink::create(output, bad_records, &headers)?;
    let stats = DatasetHasher::new(schema, config).hash_stream(reader, &mut sink)?;
    sink.finish()?;

    info!(
        hashed = stats.hashed_rows,
        bad_phones = stats.bad_phone_entries,
        "hashing finished"
    );
    Ok(stats)
}

/// Match two hashed CSVs and write the pair report to `output`
pub fn match_csv(
    first: &Path,
    second: &Path,
    output: &Path,
    config: &MatchConfig,
) -> Result<MatchSummary> {
    let left = read_hashed_dataset(first)?;
    let right = read_hashed_dataset(second)?;
    info!(
        left = left.len(),
        right = right.len(),
        policy = %config.phone_policy,
        "matching"
    );

    let outcome = match_datasets(&left, &right, config)?;
    write_match_report_file(output, &outcome, &config.list_delimiter)?;

    let summary = outcome.summary();
    info!(pairs = summary.pairs, "matching finished");
    Ok(summary)
}
