//! Building blocks of the consent model.
use num_derive::FromPrimitive;
use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;

pub mod purpose_restriction;
pub mod vector;

pub use purpose_restriction::{PurposeRestriction, PurposeRestrictionVector, RestrictionType};
pub use vector::Vector;

/// Languages the Global Vendor List declarations are published in.
pub const CONSENT_LANGUAGES: [&str; 30] = [
    "BG", "CA", "CS", "DA", "DE", "EL", "EN", "ES", "ET", "FI", "FR", "HR", "HU", "IT", "JA", "LT",
    "LV", "MT", "NL", "NO", "PL", "PT", "RO", "RU", "SK", "SL", "SR", "SV", "TR", "ZH",
];

/// Checks whether declarations are published in the given language, ignoring case.
pub fn is_consent_language(lang: &str) -> bool {
    CONSENT_LANGUAGES
        .iter()
        .any(|l| l.eq_ignore_ascii_case(lang))
}

/// The segments a TC string can be made of, identified by their 3-bit type tag.
#[derive(
    Clone, Copy, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash, FromPrimitive, Serialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Segment {
    Core = 0,
    VendorsDisclosed = 1,
    VendorsAllowed = 2,
    #[strum(serialize = "publisherTC")]
    #[serde(rename = "publisherTC")]
    PublisherTC = 3,
}

/// The error type for violations of the consent model constraints.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ModelError {
    /// A value was rejected by a field setter.
    #[error("invalid value {value} for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    /// A vendor list can only be attached once.
    #[error("a vendor list is already attached")]
    GvlAlreadySet,
    /// The operation needs an attached vendor list.
    #[error("{operation} requires a vendor list")]
    MissingGvl { operation: &'static str },
}

impl ModelError {
    pub(crate) fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;
    use test_case::test_case;

    #[test_case("en" => true)]
    #[test_case("ZH" => true)]
    #[test_case("XX" => false)]
    #[test_case("" => false)]
    fn consent_language(s: &str) -> bool {
        is_consent_language(s)
    }

    #[test_case(0 => Some(Segment::Core))]
    #[test_case(3 => Some(Segment::PublisherTC))]
    #[test_case(4 => None)]
    fn segment_from_tag(tag: u8) -> Option<Segment> {
        Segment::from_u8(tag)
    }

    #[test]
    fn segment_display() {
        assert_eq!(Segment::VendorsDisclosed.to_string(), "vendorsDisclosed");
        assert_eq!(Segment::PublisherTC.to_string(), "publisherTC");
    }
}
