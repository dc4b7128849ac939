//! Logical field definitions for raw input records
//!
//! A logical field names an attribute the hasher needs (pseudonym, names,
//! location, phones, email) independently of how a given source spells the
//! column. A [`FieldSpec`] binds one logical field to its accepted column
//! synonyms, in priority order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Attributes extracted from a raw record before fingerprinting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogicalField {
    Pseudonym,
    FirstName,
    LastName,
    City,
    State,
    Phone1,
    Phone2,
    Phone3,
    Email,
}

impl LogicalField {
    /// Every logical field, in resolution order
    pub const ALL: [LogicalField; 9] = [
        LogicalField::Pseudonym,
        LogicalField::FirstName,
        LogicalField::LastName,
        LogicalField::City,
        LogicalField::State,
        LogicalField::Phone1,
        LogicalField::Phone2,
        LogicalField::Phone3,
        LogicalField::Email,
    ];

    /// Canonical snake_case name, as accepted on the command line
    pub fn name(self) -> &'static str {
        match self {
            LogicalField::Pseudonym => "pseudonym",
            LogicalField::FirstName => "first_name",
            LogicalField::LastName => "last_name",
            LogicalField::City => "city",
            LogicalField::State => "state",
            LogicalField::Phone1 => "phone_1",
            LogicalField::Phone2 => "phone_2",
            LogicalField::Phone3 => "phone_3",
            LogicalField::Email => "email",
        }
    }

    /// Column synonyms recognised out of the box, highest priority first
    pub fn default_synonyms(self) -> &'static [&'static str] {
        match self {
            LogicalField::Pseudonym => &["Panelistid", "pseudonym", "uniqueid", "index"],
            LogicalField::FirstName => &["FirstName", "u_firstname", "firstname", "first_name"],
            LogicalField::LastName => &["LastName", "u_name", "surname", "last_name"],
            LogicalField::City => &["City", "u_city", "city"],
            LogicalField::State => &["State", "u_state", "state"],
            LogicalField::Phone1 => &[
                "Phone 1",
                "md_us_phone_1",
                "phone1",
                "phone_1",
                "md_us_phone_1_rec",
            ],
            LogicalField::Phone2 => &[
                "Phone 2",
                "md_us_phone_2",
                "phone2",
                "phone_2",
                "md_us_phone_2_rec",
            ],
            LogicalField::Phone3 => &[
                "Phone 3",
                "md_us_phone_3",
                "phone3",
                "phone_3",
                "md_us_phone_3_rec",
            ],
            LogicalField::Email => &["Email", "md_us_email", "email"],
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LogicalField::ALL
            .into_iter()
            .find(|field| field.name() == wanted)
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

/// One of the three phone columns a record may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhoneSlot {
    One,
    Two,
    Three,
}

impl PhoneSlot {
    pub const ALL: [PhoneSlot; 3] = [PhoneSlot::One, PhoneSlot::Two, PhoneSlot::Three];

    /// Zero-based position, used to index per-slot arrays
    #[inline]
    pub fn index(self) -> usize {
        match self {
            PhoneSlot::One => 0,
            PhoneSlot::Two => 1,
            PhoneSlot::Three => 2,
        }
    }

    /// The logical field this slot is resolved from
    pub fn field(self) -> LogicalField {
        match self {
            PhoneSlot::One => LogicalField::Phone1,
            PhoneSlot::Two => LogicalField::Phone2,
            PhoneSlot::Three => LogicalField::Phone3,
        }
    }

    /// Label written to the bad-phone report
    pub fn label(self) -> &'static str {
        match self {
            PhoneSlot::One => "md_us_phone_1",
            PhoneSlot::Two => "md_us_phone_2",
            PhoneSlot::Three => "md_us_phone_3",
        }
    }
}

impl fmt::Display for PhoneSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A logical field and the raw column names that may carry it
///
/// The first synonym present in a record wins, so order matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: LogicalField,
    pub synonyms: Vec<String>,
}

impl FieldSpec {
    /// Spec with no synonyms; add them with [`FieldSpec::with_synonym`]
    pub fn new(field: LogicalField) -> Self {
        Self {
            field,
            synonyms: Vec::new(),
        }
    }

    /// Spec seeded with the built-in synonym list
    pub fn standard(field: LogicalField) -> Self {
        Self {
            field,
            synonyms: field
                .default_synonyms()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Builder: append a lower-priority synonym
    pub fn with_synonym(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.synonyms.contains(&column) {
            self.synonyms.push(column);
        }
        self
    }

    /// Builder: insert a synonym ahead of all existing ones
    pub fn with_preferred_synonym(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.synonyms.retain(|existing| *existing != column);
        self.synonyms.insert(0, column);
        self
    }

    /// Validate spec configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.synonyms.is_empty() {
            return Err("at least one column synonym is required".to_string());
        }
        if self.synonyms.iter().any(|s| s.is_empty()) {
            return Err("column synonyms cannot be empty".to_string());
        }
        Ok(())
    }
}
