use crate::core::base64::base64_value;
use crate::core::{DataReader, DataWriter};
use crate::encoder::field::{Field, Width, bit_length};
use crate::error::{DecodingError, EncodingError};
use crate::model::Segment;
use crate::tc_model::{MAX_VERSION, TCModel};
use tracing::trace;

const V1_CORE: &[Field] = &[
    Field::Version,
    Field::Created,
    Field::LastUpdated,
    Field::CmpId,
    Field::CmpVersion,
    Field::ConsentScreen,
    Field::ConsentLanguage,
    Field::VendorListVersion,
    Field::PurposeConsents,
    Field::VendorConsents,
];

const V2_CORE: &[Field] = &[
    Field::Version,
    Field::Created,
    Field::LastUpdated,
    Field::CmpId,
    Field::CmpVersion,
    Field::ConsentScreen,
    Field::ConsentLanguage,
    Field::VendorListVersion,
    Field::PolicyVersion,
    Field::IsServiceSpecific,
    Field::UseNonStandardStacks,
    Field::SpecialFeatureOptins,
    Field::PurposeConsents,
    Field::PurposeLegitimateInterests,
    Field::PurposeOneTreatment,
    Field::PublisherCountryCode,
    Field::VendorConsents,
    Field::VendorLegitimateInterests,
    Field::PublisherRestrictions,
];

const V2_VENDORS_DISCLOSED: &[Field] = &[Field::VendorsDisclosed];

const V2_VENDORS_ALLOWED: &[Field] = &[Field::VendorsAllowed];

const V2_PUBLISHER_TC: &[Field] = &[
    Field::PublisherConsents,
    Field::PublisherLegitimateInterests,
    Field::NumCustomPurposes,
    Field::PublisherCustomConsents,
    Field::PublisherCustomLegitimateInterests,
];

/// The ordered fields of a segment in a given protocol version.
pub fn field_sequence(version: u8, segment: Segment) -> Option<&'static [Field]> {
    match (version, segment) {
        (1, Segment::Core) => Some(V1_CORE),
        (2, Segment::Core) => Some(V2_CORE),
        (2, Segment::VendorsDisclosed) => Some(V2_VENDORS_DISCLOSED),
        (2, Segment::VendorsAllowed) => Some(V2_VENDORS_ALLOWED),
        (2, Segment::PublisherTC) => Some(V2_PUBLISHER_TC),
        _ => None,
    }
}

/// Decodes one segment into the model.
///
/// The core segment starts with the protocol version. Other segments start with
/// their type tag, which must match `segment`, and are decoded according to the
/// version already in the model.
pub fn decode_segment(
    encoded: &str,
    model: &mut TCModel,
    segment: Segment,
) -> Result<(), DecodingError> {
    let mut r = DataReader::from_base64_url(encoded)?;

    let version = if segment == Segment::Core {
        // the first character holds exactly the version bits
        let version = encoded
            .bytes()
            .next()
            .and_then(base64_value)
            .ok_or(DecodingError::InvalidBitLength {
                expected: bit_length::VERSION as u64,
                found: 0,
            })?;
        if !(1..=MAX_VERSION).contains(&version) {
            return Err(DecodingError::UnsupportedVersion { version });
        }
        version
    } else {
        let segment_type: u8 = r.read_fixed_integer(bit_length::SEGMENT_TYPE)?;
        if segment_type != segment as u8 {
            return Err(DecodingError::UnknownSegmentType { segment_type });
        }
        model.version()
    };

    let fields =
        field_sequence(version, segment).ok_or(DecodingError::UnsupportedSegment { version, segment })?;
    trace!(%segment, version, bits = r.remaining(), "decoding segment");

    for &field in fields {
        let width = field.width(model);
        if matches!(width, Width::Fixed(0) | Width::Dependent(0)) {
            continue;
        }

        let start = r.position();
        let reported = field.decode_into(&mut r, model)?;
        let consumed = r.position() - start;

        let expected = match width {
            Width::Fixed(n) | Width::Dependent(n) => n as u64,
            Width::SelfDescribing => reported.ok_or(DecodingError::UnresolvedFieldLength(field))?,
        };
        if consumed != expected {
            return Err(DecodingError::FieldLengthMismatch {
                field,
                expected,
                consumed,
            });
        }
    }

    Ok(())
}

/// Encodes one segment of the model.
pub fn encode_segment(model: &TCModel, segment: Segment) -> Result<String, EncodingError> {
    let version = model.version();
    let fields =
        field_sequence(version, segment).ok_or(EncodingError::UnsupportedSegment { version, segment })?;

    let mut w = DataWriter::new();
    if segment != Segment::Core {
        w.write_fixed_integer(bit_length::SEGMENT_TYPE, segment as u8)?;
    }
    for &field in fields {
        field.encode_from(&mut w, model)?;
    }
    trace!(%segment, version, bits = w.len(), "encoded segment");

    w.into_base64_url()
}
