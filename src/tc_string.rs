//! The Transparency and Consent string.
//!
//! A TC string is made of one or more segments separated by a `.` character.
//! Each segment is a bit string encoded in URL-safe Base64, whose leading bits
//! identify the segment type:
//!
//! ```text
//! CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA.ZAAgH9794ulA
//! ```
//!
//! The first segment above is the core segment, which carries the protocol version
//! in place of a segment type. The second one holds publisher purposes.
//!
//! # Examples
//!
//! A string can be parsed, then decoded into a [`TCModel`]:
//!
//! ```
//! use iab_tcf::{DecodingError, TCString};
//!
//! fn main() -> Result<(), DecodingError> {
//!     let tc_str = TCString::parse_str("CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA")?;
//!     let model = tc_str.decode()?;
//!
//!     assert_eq!(model.cmp_id(), Some(31));
//!     Ok(())
//! }
//! ```
//!
//! A model is encoded back into a string:
//!
//! ```
//! use iab_tcf::{TCModel, TCString};
//!
//! let mut model = TCModel::new();
//! model.set_cmp_id(5).unwrap();
//! model.purpose_consents.set_all([1, 2, 3]).unwrap();
//!
//! let s = TCString::encode(&model).unwrap().to_string();
//! let decoded: TCModel = s.parse().unwrap();
//!
//! assert_eq!(decoded.cmp_id(), Some(5));
//! assert!(decoded.purpose_consents.has(2));
//! assert!(!decoded.purpose_consents.has(4));
//! ```
use crate::core::base64::{self, base64_value};
use crate::encoder::field::bit_length::{SEGMENT_TYPE, VERSION};
use crate::encoder::{decode_segment, encode_segment};
use crate::error::{DecodingError, EncodingError};
use crate::model::Segment;
use crate::tc_model::TCModel;
use num_traits::FromPrimitive;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const SEGMENT_SEPARATOR: char = '.';

/// A TC string split into its typed segments.
///
/// Segments are kept in the order they appear in the string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TCString {
    segments: Vec<(Segment, String)>,
}

/// Options controlling which segments [`TCString::encode_with`] produces.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EncodeOptions {
    /// Segments to produce after the core segment, which is always present.
    ///
    /// When `None`, optional segments are produced when the model has data for them.
    pub segments: Option<Vec<Segment>>,
}

impl TCString {
    /// Parses a string and returns a [`TCString`] if successful.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodingError`] if a segment is empty, contains characters outside of
    /// the URL-safe Base64 alphabet, has an unknown type, or if a segment type appears twice.
    ///
    /// # Example
    ///
    /// ```
    /// use iab_tcf::TCString;
    /// use iab_tcf::model::Segment;
    ///
    /// let tc_str = TCString::parse_str("CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA.ZAAgH9794ulA").unwrap();
    /// assert_eq!(tc_str.segment(Segment::PublisherTC), Some("ZAAgH9794ulA"));
    /// assert!(TCString::parse_str("CPXxRf..ZAAgH9794ulA").is_err());
    /// ```
    pub fn parse_str(s: &str) -> Result<Self, DecodingError> {
        s.parse()
    }

    /// Returns the raw string of a segment, if present.
    pub fn segment(&self, segment: Segment) -> Option<&str> {
        self.segments
            .iter()
            .find(|(s, _)| *s == segment)
            .map(|(_, raw)| raw.as_str())
    }

    /// Returns an iterator over the segment types and raw segment strings, in string order.
    pub fn segments(&self) -> impl Iterator<Item = (Segment, &str)> {
        self.segments.iter().map(|(s, raw)| (*s, raw.as_str()))
    }

    /// Decodes every segment into a new [`TCModel`].
    pub fn decode(&self) -> Result<TCModel, DecodingError> {
        let mut model = TCModel::new();
        self.decode_into(&mut model)?;
        Ok(model)
    }

    /// Decodes every segment into an existing model.
    ///
    /// Decoding into a model with a vendor list attached drops the publisher restrictions
    /// the vendor list does not allow.
    ///
    /// # Example
    ///
    /// ```
    /// use iab_tcf::{TCModel, TCString};
    ///
    /// let mut model = TCModel::new();
    /// TCString::parse_str("COvFyGBOvFyGBAbAAAENAPCAAOAAAAAAAAAAAEEUACCKAAA")
    ///     .unwrap()
    ///     .decode_into(&mut model)
    ///     .unwrap();
    ///
    /// assert_eq!(model.vendor_consents.iter().collect::<Vec<_>>(), vec![2, 6, 8]);
    /// ```
    pub fn decode_into(&self, model: &mut TCModel) -> Result<(), DecodingError> {
        for (segment, raw) in &self.segments {
            debug!(%segment, len = raw.len(), "decoding segment");
            decode_segment(raw, model, *segment)?;
        }
        Ok(())
    }

    /// Encodes a model with the default options.
    pub fn encode(model: &TCModel) -> Result<Self, EncodingError> {
        Self::encode_with(model, &EncodeOptions::default())
    }

    /// Encodes a model.
    ///
    /// The core segment always comes first. Unless segments are listed in `options`,
    /// version 2 models also get the disclosed and allowed vendors segments when these
    /// vectors are not empty, and the publisher segment when publisher purposes are set.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] when the CMP id is not set, when a value does not fit
    /// its field, or when a segment does not exist in the version of the model.
    pub fn encode_with(model: &TCModel, options: &EncodeOptions) -> Result<Self, EncodingError> {
        let mut segments = vec![Segment::Core];
        match &options.segments {
            Some(listed) => {
                for &s in listed {
                    if !segments.contains(&s) {
                        segments.push(s);
                    }
                }
            }
            None if model.version() >= 2 => {
                if !model.vendors_disclosed.is_empty() {
                    segments.push(Segment::VendorsDisclosed);
                }
                if !model.vendors_allowed.is_empty() {
                    segments.push(Segment::VendorsAllowed);
                }
                if model.has_publisher_data() {
                    segments.push(Segment::PublisherTC);
                }
            }
            None => {}
        }

        let segments = segments
            .into_iter()
            .map(|s| encode_segment(model, s).map(|raw| (s, raw)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

impl FromStr for TCString {
    type Err = DecodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments: Vec<(Segment, String)> = vec![];

        for (i, raw) in s.split(SEGMENT_SEPARATOR).enumerate() {
            if raw.is_empty() {
                return Err(DecodingError::EmptySegment(i));
            }
            base64::validate(raw)?;

            // the first character always exists and is valid at this point
            let first = raw.bytes().next().and_then(base64_value).unwrap_or(0);
            let segment_type = first >> (VERSION - SEGMENT_TYPE);
            let segment = Segment::from_u8(segment_type)
                .ok_or(DecodingError::UnknownSegmentType { segment_type })?;

            if segments.iter().any(|(s, _)| *s == segment) {
                return Err(DecodingError::DuplicateSegment(segment));
            }
            segments.push((segment, raw.to_string()));
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for TCString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (_, raw)) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEGMENT_SEPARATOR}")?;
            }
            f.write_str(raw)?;
        }
        Ok(())
    }
}
