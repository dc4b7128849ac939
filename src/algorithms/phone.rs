//! Phone number parsing and canonicalization
//!
//! Parses a free-form phone string in the context of a default region and
//! renders valid numbers in E.164 (`+15551234567`), so that `(555) 123-4567`,
//! `555.123.4567` and `+1 555 123 4567` all collapse to one form.
//!
//! Only the North American Numbering Plan is validated structurally.
//! Numbers dialled internationally to other plans are accepted when their
//! length is possible for E.164.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Shortest digit run that can be a phone number at all
const MIN_DIGITS: usize = 2;
/// Longest digit run accepted before giving up
const MAX_DIGITS: usize = 17;
/// E.164 bounds for numbers outside the NANP, country code included
const MIN_E164_DIGITS: usize = 8;
const MAX_E164_DIGITS: usize = 15;
/// NANP international dialling prefix
const NANP_IDD: &str = "011";
const NANP_CALLING_CODE: &str = "1";

/// Default region a national number is interpreted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Region {
    #[default]
    US,
    CA,
}

impl Region {
    /// Country calling code, without the leading `+`
    pub fn calling_code(self) -> &'static str {
        match self {
            Region::US | Region::CA => NANP_CALLING_CODE,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::US => f.write_str("US"),
            Region::CA => f.write_str("CA"),
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(Region::US),
            "CA" => Ok(Region::CA),
            other => Err(format!("unsupported region '{other}'")),
        }
    }
}

/// Why a phone string could not be parsed at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneParseError {
    #[error("The string supplied did not seem to be a phone number")]
    NotANumber,

    #[error("Unexpected character '{0}'")]
    InvalidCharacter(char),

    #[error("'+' is only allowed at the start of the number")]
    MisplacedPlus,

    #[error("The string supplied is too short to be a phone number")]
    TooShort,

    #[error("The string supplied is too long to be a phone number")]
    TooLong,
}

/// Outcome of a phone slot that did not produce a canonical number
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneFailure {
    /// Nothing to parse. Expected, counted, never reported.
    #[error("Blank phone number")]
    Blank,

    /// Parsed, but the digit count cannot be a number in its plan
    #[error("Not a possible number")]
    NotPossible,

    /// Parsed with a possible length, but no valid number type fits
    #[error("Unknown number type")]
    UnknownType,

    #[error("Failed to parse phone number: {0}")]
    Parse(#[from] PhoneParseError),
}

impl PhoneFailure {
    /// Whether this failure belongs in the bad-phone report
    pub fn is_reportable(&self) -> bool {
        !matches!(self, PhoneFailure::Blank)
    }
}

/// A parsed phone number split into calling code and national digits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    /// Calling code for NANP numbers; empty when the split is unknown
    calling_code: &'static str,
    /// Remaining digits (all digits when `calling_code` is empty)
    national: String,
}

impl PhoneNumber {
    pub fn is_nanp(&self) -> bool {
        self.calling_code == NANP_CALLING_CODE
    }

    pub fn national(&self) -> &str {
        &self.national
    }

    fn digit_count(&self) -> usize {
        self.calling_code.len() + self.national.len()
    }

    /// Whether the digit count fits the numbering plan
    pub fn is_possible(&self) -> bool {
        if self.is_nanp() {
            // 7-digit local numbers are dialable but not globally routable.
            matches!(self.national.len(), 7 | 10)
        } else {
            (MIN_E164_DIGITS..=MAX_E164_DIGITS).contains(&self.digit_count())
        }
    }

    /// Whether the number is a complete, structurally valid number
    pub fn is_valid(&self) -> bool {
        if !self.is_possible() {
            return false;
        }
        if self.is_nanp() {
            self.national.len() == 10 && is_valid_area_code(&self.national[..3])
        } else {
            true
        }
    }

    /// E.164 rendering: `+` followed by every digit
    pub fn to_e164(&self) -> String {
        let mut out = String::with_capacity(1 + self.digit_count());
        out.push('+');
        out.push_str(self.calling_code);
        out.push_str(&self.national);
        out
    }
}

/// NANP area code: `[2-9][0-8][0-9]`, excluding N11 service codes
fn is_valid_area_code(npa: &str) -> bool {
    let b = npa.as_bytes();
    b.len() == 3
        && (b'2'..=b'9').contains(&b[0])
        && b[1] != b'9'
        && !(b[1] == b'1' && b[2] == b'1')
}

/// Parse a phone string in the context of `region`.
///
/// Extensions (`x123`, `ext. 5`, `#7`, `;ext=9`) are dropped. The digits
/// may be separated by whitespace, parentheses, dashes, dots or slashes;
/// `+` may only lead.
pub fn parse_phone(raw: &str, region: Region) -> Result<PhoneNumber, PhoneParseError> {
    let trimmed = raw.trim();
    let main = strip_extension(trimmed);

    let mut digits = String::with_capacity(main.len());
    let mut international = false;
    for (i, ch) in main.char_indices() {
        match ch {
            '0'..='9' => digits.push(ch),
            '+' if i == 0 => international = true,
            '+' => return Err(PhoneParseError::MisplacedPlus),
            '(' | ')' | '-' | '.' | '/' => {}
            c if c.is_whitespace() => {}
            c => return Err(PhoneParseError::InvalidCharacter(c)),
        }
    }

    if digits.is_empty() {
        return Err(PhoneParseError::NotANumber);
    }
    if digits.len() < MIN_DIGITS {
        return Err(PhoneParseError::TooShort);
    }
    if digits.len() > MAX_DIGITS {
        return Err(PhoneParseError::TooLong);
    }

    if !international {
        if let Some(rest) = digits.strip_prefix(NANP_IDD) {
            digits = rest.to_string();
            international = true;
            if digits.len() < MIN_DIGITS {
                return Err(PhoneParseError::TooShort);
            }
        }
    }

    let number = if international {
        match digits.strip_prefix(NANP_CALLING_CODE) {
            Some(national) => PhoneNumber {
                calling_code: NANP_CALLING_CODE,
                national: national.to_string(),
            },
            None => PhoneNumber {
                calling_code: "",
                national: digits,
            },
        }
    } else {
        let national = match digits.strip_prefix('1') {
            // Trunk prefix in front of a full national number
            Some(rest) if digits.len() == 11 => rest.to_string(),
            _ => digits,
        };
        PhoneNumber {
            calling_code: region.calling_code(),
            national,
        }
    };
    Ok(number)
}

/// Cut everything from the first extension marker onwards
fn strip_extension(s: &str) -> &str {
    let lower = s.to_ascii_lowercase();
    let cut = ["ext", "x", "#", ";", ","]
        .iter()
        .filter_map(|marker| lower.find(marker))
        .min();
    match cut {
        // `to_ascii_lowercase` keeps byte offsets intact.
        Some(idx) => s[..idx].trim_end(),
        None => s,
    }
}

/// Canonicalize a phone string to E.164.
///
/// # Example
///
/// ```rust
/// use hashmatch::algorithms::phone::{normalize_phone, PhoneFailure, Region};
///
/// assert_eq!(normalize_phone("(555) 123-4567", Region::US).unwrap(), "+15551234567");
/// assert_eq!(normalize_phone("   ", Region::US), Err(PhoneFailure::Blank));
/// ```
pub fn normalize_phone(raw: &str, region: Region) -> Result<String, PhoneFailure> {
    if raw.trim().is_empty() {
        return Err(PhoneFailure::Blank);
    }
    let number = parse_phone(raw, region)?;
    if number.is_valid() {
        Ok(number.to_e164())
    } else if !number.is_possible() {
        Err(PhoneFailure::NotPossible)
    } else {
        Err(PhoneFailure::UnknownType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us(raw: &str) -> Result<String, PhoneFailure> {
        normalize_phone(raw, Region::US)
    }

    #[test]
    fn test_formats_collapse() {
        let expected = Ok("+15551234567".to_string());
        assert_eq!(us("(555) 123-4567"), expected);
        assert_eq!(us("555.123.4567"), expected);
        assert_eq!(us("+1 555 123 4567"), expected);
        assert_eq!(us("1-555-123-4567"), expected);
        assert_eq!(us("011 1 555 123 4567"), expected);
        assert_eq!(us("555/123-4567"), expected);
    }

    #[test]
    fn test_extensions_dropped() {
        assert_eq!(us("415-555-1212 x89"), Ok("+14155551212".to_string()));
        assert_eq!(us("415-555-1212 ext. 7"), Ok("+14155551212".to_string()));
        assert_eq!(us("(415) 555-1212#3"), Ok("+14155551212".to_string()));
    }

    #[test]
    fn test_blank() {
        assert_eq!(us(""), Err(PhoneFailure::Blank));
        assert_eq!(us(" \t "), Err(PhoneFailure::Blank));
        assert!(!PhoneFailure::Blank.is_reportable());
    }

    #[test]
    fn test_not_possible() {
        assert_eq!(us("555-1234-56"), Err(PhoneFailure::NotPossible));
        assert_eq!(us("12345"), Err(PhoneFailure::NotPossible));
        assert!(PhoneFailure::NotPossible.is_reportable());
    }

    #[test]
    fn test_unknown_type() {
        // Local-only seven digit number
        assert_eq!(us("555-1234"), Err(PhoneFailure::UnknownType));
        // Area codes starting with 0/1, N9X and N11 are not assigned
        assert_eq!(us("(055) 123-4567"), Err(PhoneFailure::UnknownType));
        assert_eq!(us("(295) 123-4567"), Err(PhoneFailure::UnknownType));
        assert_eq!(us("(411) 123-4567"), Err(PhoneFailure::UnknownType));
        assert_eq!(us("(281) 123-4567"), Ok("+12811234567".to_string()));
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(
            us("call me"),
            Err(PhoneFailure::Parse(PhoneParseError::InvalidCharacter('c')))
        );
        assert_eq!(us("x123"), Err(PhoneFailure::Parse(PhoneParseError::NotANumber)));
        assert_eq!(us("5"), Err(PhoneFailure::Parse(PhoneParseError::TooShort)));
        assert_eq!(
            us("555+1234567"),
            Err(PhoneFailure::Parse(PhoneParseError::MisplacedPlus))
        );
        assert_eq!(
            us("123456789012345678"),
            Err(PhoneFailure::Parse(PhoneParseError::TooLong))
        );
    }

    #[test]
    fn test_failure_reasons() {
        assert_eq!(PhoneFailure::NotPossible.to_string(), "Not a possible number");
        assert_eq!(PhoneFailure::UnknownType.to_string(), "Unknown number type");
        assert!(PhoneFailure::Parse(PhoneParseError::TooShort)
            .to_string()
            .starts_with("Failed to parse phone number: "));
    }

    #[test]
    fn test_international_outside_nanp() {
        assert_eq!(us("+44 20 7946 0958"), Ok("+442079460958".to_string()));
        assert_eq!(us("011 44 20 7946 0958"), Ok("+442079460958".to_string()));
        assert_eq!(us("+44 12"), Err(PhoneFailure::NotPossible));
    }

    #[test]
    fn test_region_parse() {
        assert_eq!("us".parse::<Region>().unwrap(), Region::US);
        assert_eq!("CA".parse::<Region>().unwrap(), Region::CA);
        assert!("de".parse::<Region>().is_err());
        assert_eq!(
            normalize_phone("604 555 0199", Region::CA),
            Ok("+16045550199".to_string())
        );
    }
}
