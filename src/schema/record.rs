//! Raw input records
//!
//! A raw record is one row of a source file: column name to string value,
//! in the order the columns appeared. It only lives long enough to be
//! resolved and fingerprinted, or copied into the bad-phone report.

use indexmap::IndexMap;

/// One row of raw input, column order preserved
///
/// # Example
///
/// ```rust
/// use hashmatch::schema::RawRecord;
///
/// let mut record = RawRecord::new();
/// record.set_field("pseudonym", "alice123");
/// record.set_field("Email", "Alice@Example.com");
/// assert_eq!(record.get_field("Email"), Some("Alice@Example.com"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: IndexMap<String, String>,
}

impl RawRecord {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from header names and the matching row values.
    ///
    /// Missing trailing values leave the column absent; extra values
    /// without a header are dropped.
    pub fn from_row<H, V>(headers: H, values: V) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let fields = headers
            .into_iter()
            .zip(values)
            .map(|(h, v)| (h.into(), v.into()))
            .collect();
        Self { fields }
    }

    /// Set a field value; an existing column keeps its position
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Iterate `(column, value)` pairs in input order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for RawRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
