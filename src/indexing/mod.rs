//! Indexing structures for cross-dataset matching
//!
//! - Fingerprint index: exact-value inverted index, one per match key
//! - Index set: all indices of one hashed dataset, built in a single pass

pub mod fingerprint_index;

pub use fingerprint_index::*;
