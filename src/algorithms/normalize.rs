//! Field normalization utilities
//!
//! Canonicalizes raw values so that equivalent spellings collapse to one
//! form before hashing. Every function here is deterministic and total:
//! blank or unrecognised input maps to an empty string or passes through.

use ahash::AHashMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

// ============================================================================
// Patterns
// ============================================================================

/// Leading/trailing commas, dots and whitespace
static EDGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[,.\s]+|[,.\s]+$").expect("valid edge pattern"));

/// Secondary-unit designator followed by its identifier token
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(?:apartment|apt|suite|ste|unit|floor|fl)\b\.?|#)\s*[\w-]+")
        .expect("valid unit pattern")
});

/// Street-suffix and direction words, with an optional trailing dot
static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    let words: Vec<&str> = ADDRESS_ABBREVIATIONS.iter().map(|(w, _)| *w).collect();
    Regex::new(&format!(r"\b({})\b\.?", words.join("|"))).expect("valid suffix pattern")
});

static PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"));

static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Word → standard abbreviation
const ADDRESS_ABBREVIATIONS: &[(&str, &str)] = &[
    ("street", "st"),
    ("avenue", "ave"),
    ("road", "rd"),
    ("drive", "dr"),
    ("place", "pl"),
    ("lane", "ln"),
    ("highway", "hwy"),
    ("court", "ct"),
    ("square", "sq"),
    ("loop", "lp"),
    ("trail", "trl"),
    ("parkway", "pkwy"),
    ("commons", "cmns"),
    ("north", "n"),
    ("south", "s"),
    ("east", "e"),
    ("west", "w"),
    ("boulevard", "blvd"),
    ("circle", "cir"),
    ("terrace", "ter"),
];

/// US states and Canadian provinces: full name → postal code
const STATE_PROVINCE_CODES: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
    ("Ontario", "ON"),
    ("Quebec", "QC"),
    ("Nova Scotia", "NS"),
    ("New Brunswick", "NB"),
    ("Manitoba", "MB"),
    ("British Columbia", "BC"),
    ("Prince Edward Island", "PE"),
    ("Saskatchewan", "SK"),
    ("Alberta", "AB"),
    ("Newfoundland and Labrador", "NL"),
];

/// Title-cased full names to their two-letter code
static STATE_LOOKUP: LazyLock<AHashMap<&'static str, &'static str>> =
    LazyLock::new(|| STATE_PROVINCE_CODES.iter().copied().collect());

// ============================================================================
// Normalizers
// ============================================================================

/// Trim and case-fold a raw field value
#[must_use]
pub fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Canonicalize a postal address or city.
///
/// Lower-cases, drops unit designators ("apt 4b", "suite 200", "# 12"),
/// abbreviates street suffixes and directions, strips punctuation and
/// collapses whitespace. The result is a fixed point: normalizing it again
/// returns it unchanged.
///
/// # Example
///
/// ```rust
/// use hashmatch::algorithms::normalize::normalize_address;
///
/// assert_eq!(normalize_address("123 Main Street, Apt 4B"), "123 main st");
/// assert_eq!(normalize_address("123 main st"), "123 main st");
/// ```
#[must_use]
pub fn normalize_address(s: &str) -> String {
    let mut current = normalize_address_pass(s);
    loop {
        let next = normalize_address_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// One pass of address canonicalization.
///
/// After the first pass every later pass can only shorten the string, so
/// iterating to a fixed point terminates.
fn normalize_address_pass(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let lowered = s.to_lowercase();
    let trimmed = EDGE_RE.replace_all(lowered.trim(), "");
    let without_units = UNIT_RE.replace_all(&trimmed, "");
    let abbreviated = SUFFIX_RE.replace_all(&without_units, |caps: &Captures| {
        abbreviation(&caps[1]).to_string()
    });
    let bare = PUNCT_RE.replace_all(&abbreviated, "");
    SPACE_RE.replace_all(&bare, " ").trim().to_string()
}

fn abbreviation(word: &str) -> &'static str {
    ADDRESS_ABBREVIATIONS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, abbr)| *abbr)
        .unwrap_or_default()
}

/// Map a US state or Canadian province name to its two-letter code.
///
/// The input is title-cased and looked up by full name only. Codes and
/// unrecognised values are returned unchanged, so `"illinois"` becomes
/// `"IL"` while `"il"` stays `"il"`.
#[must_use]
pub fn normalize_state(s: &str) -> String {
    match STATE_LOOKUP.get(title_case(s).as_str()) {
        Some(code) => (*code).to_string(),
        None => s.to_string(),
    }
}

/// Upper-case the first letter of every run of cased characters and
/// lower-case the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_uppercase() || c.is_lowercase() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// First character of a value, or empty when blank
#[must_use]
pub fn initial(s: &str) -> &str {
    s.char_indices()
        .nth(1)
        .map_or(s, |(end, _)| &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_address_unit_and_suffix() {
        assert_eq!(
            normalize_address("123 Main Street, Apt 4B"),
            normalize_address("123 main st")
        );
        assert_eq!(normalize_address("500 North Oak Avenue Suite 200"), "500 n oak ave");
        assert_eq!(normalize_address("9 Elm Blvd. #12"), "9 elm blvd");
        assert_eq!(normalize_address("77 West Road, Floor 3"), "77 w rd");
    }

    #[test]
    fn test_address_keeps_words_starting_with_designators() {
        assert_eq!(normalize_address("Aptos"), "aptos");
        assert_eq!(normalize_address("Flint"), "flint");
        assert_eq!(normalize_address("United Street"), "united st");
    }

    #[test]
    fn test_address_edges_and_whitespace() {
        assert_eq!(normalize_address(" ,. Springfield ,."), "springfield");
        assert_eq!(normalize_address("Salt   Lake\tCity"), "salt lake city");
        assert_eq!(normalize_address(""), "");
        assert_eq!(normalize_address(" .,; "), "");
    }

    #[test]
    fn test_address_fixed_point_after_punctuation_removal() {
        // Stripping the comma exposes a designator on the second pass.
        let once = normalize_address("s,te 5 main");
        assert_eq!(once, "main");
        assert_eq!(normalize_address(&once), once);
    }

    #[test]
    fn test_state_full_names() {
        assert_eq!(normalize_state("new york"), "NY");
        assert_eq!(normalize_state("British Columbia"), "BC");
        assert_eq!(normalize_state("ILLINOIS"), "IL");
        assert_eq!(normalize_state("prince edward island"), "PE");
    }

    #[test]
    fn test_state_codes_and_passthrough() {
        assert_eq!(normalize_state("il"), "il");
        assert_eq!(normalize_state("ny"), "ny");
        assert_eq!(normalize_state("Qc"), "Qc");
        assert_eq!(normalize_state("bavaria"), "bavaria");
        assert_eq!(normalize_state(""), "");
    }

    #[test]
    fn test_state_lookup_is_exact_after_title_case() {
        // Title-casing capitalises "And", and runs of spaces are kept
        assert_eq!(
            normalize_state("newfoundland and labrador"),
            "newfoundland and labrador"
        );
        assert_eq!(normalize_state("north   carolina"), "north   carolina");
        assert_eq!(normalize_state(" texas"), " texas");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("new york"), "New York");
        assert_eq!(title_case("rHODE iSLAND"), "Rhode Island");
        assert_eq!(title_case("o'neil-smith"), "O'Neil-Smith");
    }

    #[test]
    fn test_initial() {
        assert_eq!(initial("alice"), "a");
        assert_eq!(initial("émile"), "é");
        assert_eq!(initial(""), "");
    }

    proptest! {
        #[test]
        fn prop_address_idempotent(s in "\\PC{0,40}") {
            let once = normalize_address(&s);
            prop_assert_eq!(normalize_address(&once), once);
        }

        #[test]
        fn prop_address_idempotent_on_address_like(
            s in "[0-9]{1,4} [A-Za-z]{1,8} (Street|St|Avenue|Apt|Suite|#|North|,|\\.| ){0,6}[A-Za-z0-9]{0,3}"
        ) {
            let once = normalize_address(&s);
            prop_assert_eq!(normalize_address(&once), once);
        }
    }
}
