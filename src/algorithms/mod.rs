//! Value-level algorithms: normalizers and fingerprinting
//!
//! Each normalizer is a standalone pure function so the hasher can compose
//! them per field. The one normalizer that can reject input (phones)
//! reports why through [`phone::PhoneFailure`] rather than an error.

pub mod fingerprint;
pub mod normalize;
pub mod phone;

pub use fingerprint::Fingerprint;
pub use normalize::{initial, normalize_address, normalize_state, normalize_text};
pub use phone::{normalize_phone, parse_phone, PhoneFailure, PhoneNumber, PhoneParseError, Region};
