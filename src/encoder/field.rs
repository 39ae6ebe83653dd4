use crate::core::{DataReader, DataWriter};
use crate::encoder::vector::{
    decode_fixed_vector, decode_purpose_restrictions, decode_vendor_vector,
    encode_purpose_restrictions, encode_vendor_vector,
};
use crate::error::{DecodingError, EncodingError};
use crate::tc_model::TCModel;
use std::io::Read;
use strum_macros::Display;

/// Widths, in bits, of the fixed-size parts of a TC string.
pub mod bit_length {
    pub const SEGMENT_TYPE: u32 = 3;
    pub const VERSION: u32 = 6;
    pub const CREATED: u32 = 36;
    pub const LAST_UPDATED: u32 = 36;
    pub const CMP_ID: u32 = 12;
    pub const CMP_VERSION: u32 = 12;
    pub const CONSENT_SCREEN: u32 = 6;
    pub const CONSENT_LANGUAGE: u32 = 12;
    pub const VENDOR_LIST_VERSION: u32 = 12;
    pub const POLICY_VERSION: u32 = 6;
    pub const IS_SERVICE_SPECIFIC: u32 = 1;
    pub const USE_NON_STANDARD_STACKS: u32 = 1;
    pub const SPECIAL_FEATURE_OPTINS: u32 = 12;
    pub const PURPOSE_CONSENTS: u32 = 24;
    pub const PURPOSE_LEGITIMATE_INTERESTS: u32 = 24;
    pub const PURPOSE_ONE_TREATMENT: u32 = 1;
    pub const PUBLISHER_COUNTRY_CODE: u32 = 12;
    pub const PUBLISHER_CONSENTS: u32 = 24;
    pub const PUBLISHER_LEGITIMATE_INTERESTS: u32 = 24;
    pub const NUM_CUSTOM_PURPOSES: u32 = 6;
    pub const MAX_ID: u32 = 16;
    pub const ENCODING_TYPE: u32 = 1;
    pub const DEFAULT_CONSENT: u32 = 1;
    pub const NUM_RESTRICTIONS: u32 = 12;
    pub const PURPOSE_ID: u32 = 6;
    pub const RESTRICTION_TYPE: u32 = 2;
}

/// Every field which can appear in a segment.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash)]
#[strum(serialize_all = "camelCase")]
pub enum Field {
    Version,
    Created,
    LastUpdated,
    CmpId,
    CmpVersion,
    ConsentScreen,
    ConsentLanguage,
    VendorListVersion,
    PolicyVersion,
    IsServiceSpecific,
    UseNonStandardStacks,
    SpecialFeatureOptins,
    PurposeConsents,
    PurposeLegitimateInterests,
    PurposeOneTreatment,
    PublisherCountryCode,
    VendorConsents,
    VendorLegitimateInterests,
    PublisherRestrictions,
    VendorsDisclosed,
    VendorsAllowed,
    PublisherConsents,
    PublisherLegitimateInterests,
    NumCustomPurposes,
    PublisherCustomConsents,
    PublisherCustomLegitimateInterests,
}

/// How many bits a field occupies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Width {
    /// Always the same number of bits.
    Fixed(u32),
    /// A number of bits given by a previously decoded field.
    Dependent(u32),
    /// Known only once the field has been decoded.
    SelfDescribing,
}

impl Field {
    /// Width of the field when it does not depend on the content of the string.
    pub fn static_width(self) -> Option<u32> {
        use bit_length::*;

        let width = match self {
            Field::Version => VERSION,
            Field::Created => CREATED,
            Field::LastUpdated => LAST_UPDATED,
            Field::CmpId => CMP_ID,
            Field::CmpVersion => CMP_VERSION,
            Field::ConsentScreen => CONSENT_SCREEN,
            Field::ConsentLanguage => CONSENT_LANGUAGE,
            Field::VendorListVersion => VENDOR_LIST_VERSION,
            Field::PolicyVersion => POLICY_VERSION,
            Field::IsServiceSpecific => IS_SERVICE_SPECIFIC,
            Field::UseNonStandardStacks => USE_NON_STANDARD_STACKS,
            Field::SpecialFeatureOptins => SPECIAL_FEATURE_OPTINS,
            Field::PurposeConsents => PURPOSE_CONSENTS,
            Field::PurposeLegitimateInterests => PURPOSE_LEGITIMATE_INTERESTS,
            Field::PurposeOneTreatment => PURPOSE_ONE_TREATMENT,
            Field::PublisherCountryCode => PUBLISHER_COUNTRY_CODE,
            Field::PublisherConsents => PUBLISHER_CONSENTS,
            Field::PublisherLegitimateInterests => PUBLISHER_LEGITIMATE_INTERESTS,
            Field::NumCustomPurposes => NUM_CUSTOM_PURPOSES,
            _ => return None,
        };
        Some(width)
    }

    pub fn width(self, model: &TCModel) -> Width {
        match self {
            Field::PublisherCustomConsents | Field::PublisherCustomLegitimateInterests => {
                Width::Dependent(model.num_custom_purposes() as u32)
            }
            Field::VendorConsents
            | Field::VendorLegitimateInterests
            | Field::VendorsDisclosed
            | Field::VendorsAllowed
            | Field::PublisherRestrictions => Width::SelfDescribing,
            _ => self.static_width().map_or(Width::SelfDescribing, Width::Fixed),
        }
    }

    /// Reads the field and stores it into the model.
    ///
    /// Self-describing fields return the number of bits they occupied.
    pub fn decode_into<R>(
        self,
        r: &mut DataReader<R>,
        model: &mut TCModel,
    ) -> Result<Option<u64>, DecodingError>
    where
        R: Read,
    {
        use bit_length::*;

        match self {
            Field::Version => model.set_version(r.read_fixed_integer(VERSION)?)?,
            Field::Created => model.set_created(r.read_datetime(CREATED)?),
            Field::LastUpdated => model.set_last_updated(r.read_datetime(LAST_UPDATED)?),
            Field::CmpId => model.set_cmp_id(r.read_fixed_integer(CMP_ID)?)?,
            Field::CmpVersion => model.set_cmp_version(r.read_fixed_integer(CMP_VERSION)?),
            Field::ConsentScreen => {
                model.set_consent_screen(r.read_fixed_integer(CONSENT_SCREEN)?)
            }
            Field::ConsentLanguage => {
                model.set_consent_language(&r.read_language(CONSENT_LANGUAGE)?)?
            }
            Field::VendorListVersion => {
                model.set_vendor_list_version(r.read_fixed_integer(VENDOR_LIST_VERSION)?)
            }
            Field::PolicyVersion => {
                model.set_policy_version(r.read_fixed_integer(POLICY_VERSION)?)
            }
            Field::IsServiceSpecific => model.is_service_specific = r.read_bool()?,
            Field::UseNonStandardStacks => model.use_non_standard_stacks = r.read_bool()?,
            Field::SpecialFeatureOptins => {
                model.special_feature_optins = decode_fixed_vector(r, SPECIAL_FEATURE_OPTINS)?
            }
            Field::PurposeConsents => {
                model.purpose_consents = decode_fixed_vector(r, PURPOSE_CONSENTS)?
            }
            Field::PurposeLegitimateInterests => {
                model.purpose_legitimate_interests =
                    decode_fixed_vector(r, PURPOSE_LEGITIMATE_INTERESTS)?
            }
            Field::PurposeOneTreatment => model.purpose_one_treatment = r.read_bool()?,
            Field::PublisherCountryCode => {
                model.set_publisher_country_code(&r.read_language(PUBLISHER_COUNTRY_CODE)?)?
            }
            Field::VendorConsents => {
                model.vendor_consents = decode_vendor_vector(r, model.version())?;
                return Ok(model.vendor_consents.bit_length());
            }
            Field::VendorLegitimateInterests => {
                model.vendor_legitimate_interests = decode_vendor_vector(r, model.version())?;
                return Ok(model.vendor_legitimate_interests.bit_length());
            }
            Field::VendorsDisclosed => {
                model.vendors_disclosed = decode_vendor_vector(r, model.version())?;
                return Ok(model.vendors_disclosed.bit_length());
            }
            Field::VendorsAllowed => {
                model.vendors_allowed = decode_vendor_vector(r, model.version())?;
                return Ok(model.vendors_allowed.bit_length());
            }
            Field::PublisherRestrictions => {
                let restrictions = decode_purpose_restrictions(r, model.gvl())?;
                let bit_length = restrictions.bit_length();
                model.set_publisher_restrictions(restrictions)?;
                return Ok(bit_length);
            }
            Field::PublisherConsents => {
                model.publisher_consents = decode_fixed_vector(r, PUBLISHER_CONSENTS)?
            }
            Field::PublisherLegitimateInterests => {
                model.publisher_legitimate_interests =
                    decode_fixed_vector(r, PUBLISHER_LEGITIMATE_INTERESTS)?
            }
            Field::NumCustomPurposes => {
                model.set_num_custom_purposes(r.read_fixed_integer(NUM_CUSTOM_PURPOSES)?)
            }
            Field::PublisherCustomConsents => {
                let width = model.num_custom_purposes() as u32;
                model.publisher_custom_consents = decode_fixed_vector(r, width)?
            }
            Field::PublisherCustomLegitimateInterests => {
                let width = model.num_custom_purposes() as u32;
                model.publisher_custom_legitimate_interests = decode_fixed_vector(r, width)?
            }
        }

        Ok(None)
    }

    /// Writes the field from the model.
    ///
    /// Unassigned metadata is written as zero, except for the CMP id which must be set.
    pub fn encode_from(self, w: &mut DataWriter, model: &TCModel) -> Result<(), EncodingError> {
        use bit_length::*;

        match self {
            Field::Version => w.write_fixed_integer(VERSION, model.version()),
            Field::Created => w.write_datetime(CREATED, &model.created()),
            Field::LastUpdated => w.write_datetime(LAST_UPDATED, &model.last_updated()),
            Field::CmpId => {
                let cmp_id = model.cmp_id().ok_or(EncodingError::MissingField(Field::CmpId))?;
                w.write_fixed_integer(CMP_ID, cmp_id)
            }
            Field::CmpVersion => {
                w.write_fixed_integer(CMP_VERSION, model.cmp_version().unwrap_or(0))
            }
            Field::ConsentScreen => {
                w.write_fixed_integer(CONSENT_SCREEN, model.consent_screen().unwrap_or(0))
            }
            Field::ConsentLanguage => w.write_language(CONSENT_LANGUAGE, model.consent_language()),
            Field::VendorListVersion => w.write_fixed_integer(
                VENDOR_LIST_VERSION,
                model.vendor_list_version().unwrap_or(0),
            ),
            Field::PolicyVersion => {
                w.write_fixed_integer(POLICY_VERSION, model.policy_version().unwrap_or(0))
            }
            Field::IsServiceSpecific => w.write_bool(model.is_service_specific),
            Field::UseNonStandardStacks => w.write_bool(model.use_non_standard_stacks),
            Field::SpecialFeatureOptins => {
                w.write_fixed_bitfield(SPECIAL_FEATURE_OPTINS, &model.special_feature_optins)
            }
            Field::PurposeConsents => {
                w.write_fixed_bitfield(PURPOSE_CONSENTS, &model.purpose_consents)
            }
            Field::PurposeLegitimateInterests => w.write_fixed_bitfield(
                PURPOSE_LEGITIMATE_INTERESTS,
                &model.purpose_legitimate_interests,
            ),
            Field::PurposeOneTreatment => w.write_bool(model.purpose_one_treatment),
            Field::PublisherCountryCode => {
                w.write_language(PUBLISHER_COUNTRY_CODE, model.publisher_country_code())
            }
            Field::VendorConsents => encode_vendor_vector(w, &model.vendor_consents, model.version()),
            Field::VendorLegitimateInterests => {
                encode_vendor_vector(w, &model.vendor_legitimate_interests, model.version())
            }
            Field::VendorsDisclosed => {
                encode_vendor_vector(w, &model.vendors_disclosed, model.version())
            }
            Field::VendorsAllowed => encode_vendor_vector(w, &model.vendors_allowed, model.version()),
            Field::PublisherRestrictions => {
                encode_purpose_restrictions(w, model.publisher_restrictions())
            }
            Field::PublisherConsents => {
                w.write_fixed_bitfield(PUBLISHER_CONSENTS, &model.publisher_consents)
            }
            Field::PublisherLegitimateInterests => w.write_fixed_bitfield(
                PUBLISHER_LEGITIMATE_INTERESTS,
                &model.publisher_legitimate_interests,
            ),
            Field::NumCustomPurposes => {
                w.write_fixed_integer(NUM_CUSTOM_PURPOSES, model.num_custom_purposes())
            }
            Field::PublisherCustomConsents => w.write_fixed_bitfield(
                model.num_custom_purposes() as u32,
                &model.publisher_custom_consents,
            ),
            Field::PublisherCustomLegitimateInterests => w.write_fixed_bitfield(
                model.num_custom_purposes() as u32,
                &model.publisher_custom_legitimate_interests,
            ),
        }
    }
}
