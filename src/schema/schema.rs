//! Field schema and resolver
//!
//! The schema is the precomputed table from logical field to accepted
//! column synonyms. It is built once at startup and then consulted for
//! every record, so per-row resolution is a short ordered probe instead of
//! repeated membership checks.

use super::field::{FieldSpec, LogicalField};
use super::record::RawRecord;
use crate::algorithms::normalize::normalize_text;
use ahash::AHashMap;
use thiserror::Error;

/// Errors that can occur while building a schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A logical field was declared twice
    #[error("Duplicate field: {0}")]
    DuplicateField(LogicalField),

    /// A logical field has no spec
    #[error("Missing field: {0}")]
    MissingField(LogicalField),

    /// Field validation failed
    #[error("Field '{0}' validation failed: {1}")]
    InvalidField(LogicalField, String),

    /// A `FIELD=COLUMN` override could not be parsed
    #[error("Invalid column override '{0}': expected FIELD=COLUMN")]
    InvalidOverride(String),
}

/// Immutable table of every logical field and its column synonyms
///
/// # Example
///
/// ```rust
/// use hashmatch::schema::{FieldSchema, LogicalField, RawRecord};
///
/// let schema = FieldSchema::standard();
/// let mut record = RawRecord::new();
/// record.set_field("u_city", "  Springfield ");
/// assert_eq!(schema.resolve(&record, LogicalField::City), "springfield");
/// ```
#[derive(Debug, Clone)]
pub struct FieldSchema {
    specs: Vec<FieldSpec>,
    field_map: AHashMap<LogicalField, usize>,
}

impl FieldSchema {
    pub fn builder() -> FieldSchemaBuilder {
        FieldSchemaBuilder::new()
    }

    /// Schema with the built-in synonyms for every field
    pub fn standard() -> Self {
        FieldSchemaBuilder::standard()
            .build()
            .unwrap_or_else(|_| unreachable!("built-in synonym table is valid"))
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    pub fn get_spec(&self, field: LogicalField) -> Option<&FieldSpec> {
        self.field_map.get(&field).map(|&idx| &self.specs[idx])
    }

    /// Find the raw value for `field`, trimmed and case-folded.
    ///
    /// The first synonym present as a column wins even if its value is
    /// blank. Returns an empty string when no synonym is present.
    pub fn resolve(&self, record: &RawRecord, field: LogicalField) -> String {
        self.resolve_raw(record, field)
            .map(normalize_text)
            .unwrap_or_default()
    }

    /// The untouched value of the first synonym present, if any
    pub fn resolve_raw<'r>(&self, record: &'r RawRecord, field: LogicalField) -> Option<&'r str> {
        let spec = self.get_spec(field)?;
        spec.synonyms
            .iter()
            .find_map(|column| record.get_field(column))
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for spec in &self.specs {
            spec.validate()
                .map_err(|e| SchemaError::InvalidField(spec.field, e))?;
        }
        for field in LogicalField::ALL {
            if !self.field_map.contains_key(&field) {
                return Err(SchemaError::MissingField(field));
            }
        }
        Ok(())
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builder for constructing a [`FieldSchema`]
pub struct FieldSchemaBuilder {
    specs: Vec<FieldSpec>,
}

impl FieldSchemaBuilder {
    /// Empty builder; every logical field must be added before `build`
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Builder pre-populated with the built-in synonym table
    pub fn standard() -> Self {
        Self {
            specs: LogicalField::ALL.into_iter().map(FieldSpec::standard).collect(),
        }
    }

    pub fn add_spec(mut self, spec: FieldSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Make `column` the highest-priority synonym for `field`
    pub fn prefer_column(mut self, field: LogicalField, column: impl Into<String>) -> Self {
        let column = column.into();
        match self.specs.iter().position(|s| s.field == field) {
            Some(idx) => {
                let spec = self.specs.remove(idx);
                self.specs.insert(idx, spec.with_preferred_synonym(column));
            }
            None => self.specs.push(FieldSpec::new(field).with_synonym(column)),
        }
        self
    }

    /// Apply a `FIELD=COLUMN` override as given on the command line
    pub fn apply_override(self, spec: &str) -> Result<Self, SchemaError> {
        let (field, column) = parse_override(spec)?;
        Ok(self.prefer_column(field, column))
    }

    pub fn build(self) -> Result<FieldSchema, SchemaError> {
        let mut field_map = AHashMap::with_capacity(self.specs.len());
        for (idx, spec) in self.specs.iter().enumerate() {
            if field_map.insert(spec.field, idx).is_some() {
                return Err(SchemaError::DuplicateField(spec.field));
            }
        }

        let schema = FieldSchema {
            specs: self.specs,
            field_map,
        };
        schema.validate()?;
        Ok(schema)
    }
}

impl Default for FieldSchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `FIELD=COLUMN`, e.g. `pseudonym=CustomerId`
pub fn parse_override(spec: &str) -> Result<(LogicalField, String), SchemaError> {
    let (field, column) = spec
        .split_once('=')
        .ok_or_else(|| SchemaError::InvalidOverride(spec.to_string()))?;
    let field: LogicalField = field
        .parse()
        .map_err(|_| SchemaError::InvalidOverride(spec.to_string()))?;
    if column.is_empty() {
        return Err(SchemaError::InvalidOverride(spec.to_string()));
    }
    Ok((field, column.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_standard_schema_covers_all_fields() {
        let schema = FieldSchema::standard();
        for field in LogicalField::ALL {
            assert!(schema.get_spec(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn test_resolve_first_synonym_wins() {
        let schema = FieldSchema::standard();
        let rec = record(&[("pseudonym", "Second"), ("Panelistid", " First ")]);
        assert_eq!(schema.resolve(&rec, LogicalField::Pseudonym), "first");
    }

    #[test]
    fn test_resolve_present_but_blank_wins() {
        let schema = FieldSchema::standard();
        let rec = record(&[("Email", "  "), ("email", "a@b.com")]);
        assert_eq!(schema.resolve(&rec, LogicalField::Email), "");
    }

    #[test]
    fn test_resolve_absent_is_empty() {
        let schema = FieldSchema::standard();
        let rec = record(&[("unrelated", "x")]);
        assert_eq!(schema.resolve(&rec, LogicalField::LastName), "");
        assert_eq!(schema.resolve_raw(&rec, LogicalField::LastName), None);
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let err = FieldSchemaBuilder::standard()
            .add_spec(FieldSpec::standard(LogicalField::City))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField(LogicalField::City));
    }

    #[test]
    fn test_builder_rejects_missing_field() {
        let err = FieldSchema::builder()
            .add_spec(FieldSpec::standard(LogicalField::Pseudonym))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingField(LogicalField::FirstName));
    }

    #[test]
    fn test_override_takes_priority() {
        let schema = FieldSchemaBuilder::standard()
            .apply_override("pseudonym=CustomerId")
            .unwrap()
            .build()
            .unwrap();
        let rec = record(&[("pseudonym", "old"), ("CustomerId", "C-1")]);
        assert_eq!(schema.resolve(&rec, LogicalField::Pseudonym), "c-1");
    }

    #[test]
    fn test_parse_override_errors() {
        assert!(parse_override("pseudonym").is_err());
        assert!(parse_override("nope=Col").is_err());
        assert!(parse_override("email=").is_err());
        assert_eq!(
            parse_override("email=Mail").unwrap(),
            (LogicalField::Email, "Mail".to_string())
        );
    }
}
