//! Codecs of the id sets: fixed bitfields, vendor vectors and publisher restrictions.
use crate::core::{DataReader, DataWriter, group_ranges, range_entries_bit_length};
use crate::encoder::field::bit_length::{
    DEFAULT_CONSENT, MAX_ID, NUM_RESTRICTIONS, PURPOSE_ID, RESTRICTION_TYPE,
};
use crate::error::{DecodingError, EncodingError};
use crate::gvl::Gvl;
use crate::model::{PurposeRestriction, PurposeRestrictionVector, RestrictionType, Vector};
use num_traits::FromPrimitive;
use std::collections::BTreeSet;
use std::io::Read;
use std::sync::Arc;

pub fn decode_fixed_vector<R>(r: &mut DataReader<R>, bits: u32) -> Result<Vector, DecodingError>
where
    R: Read,
{
    let ids = r.read_fixed_bitfield(bits)?;
    Ok(Vector::decoded(ids, bits as u64))
}

/// Reads a vendor vector: a maximum id and an encoding type, followed by either a
/// bitfield or a list of id ranges.
///
/// In version 1 strings, range lists carry a default consent flag. When it is set,
/// the ranges list the vendors *without* consent.
pub fn decode_vendor_vector<R>(r: &mut DataReader<R>, version: u8) -> Result<Vector, DecodingError>
where
    R: Read,
{
    let start = r.position();
    let max_id: u16 = r.read_fixed_integer(MAX_ID)?;
    let is_range: bool = r.read_bool()?;

    let ids = if is_range {
        let default_consent = version == 1 && r.read_bool()?;
        let listed = r
            .read_range_entries()?
            .into_iter()
            .flatten()
            .filter(|&id| id != 0)
            .collect::<BTreeSet<_>>();

        if default_consent {
            (1..=max_id).filter(|id| !listed.contains(id)).collect()
        } else {
            listed
        }
    } else {
        r.read_fixed_bitfield(max_id as u32)?
    };

    Ok(Vector::decoded(ids, r.position() - start))
}

/// Writes a vendor vector, as a list of ranges when that is strictly shorter than a
/// bitfield.
pub fn encode_vendor_vector(
    w: &mut DataWriter,
    vector: &Vector,
    version: u8,
) -> Result<(), EncodingError> {
    let max_id = vector.max_id();
    let ranges = group_ranges(vector);

    let default_consent_len = if version == 1 { DEFAULT_CONSENT as u64 } else { 0 };
    let range_len = default_consent_len + range_entries_bit_length(&ranges);
    let use_ranges = range_len < max_id as u64;

    w.write_fixed_integer(MAX_ID, max_id)?;
    w.write_bool(use_ranges)?;
    if use_ranges {
        if version == 1 {
            w.write_bool(false)?;
        }
        w.write_range_entries(&ranges)
    } else {
        w.write_fixed_bitfield(max_id as u32, vector)
    }
}

/// Reads publisher restrictions, adding every pair through
/// [`PurposeRestrictionVector::add`] so that a vendor list, when given, filters out
/// the restrictions it does not allow. Ranges covering vendor 0 skip it.
pub fn decode_purpose_restrictions<R>(
    r: &mut DataReader<R>,
    gvl: Option<&Arc<Gvl>>,
) -> Result<PurposeRestrictionVector, DecodingError>
where
    R: Read,
{
    let start = r.position();
    let mut restrictions = PurposeRestrictionVector::new();
    if let Some(gvl) = gvl {
        restrictions.set_gvl(gvl.clone())?;
    }

    let n: u16 = r.read_fixed_integer(NUM_RESTRICTIONS)?;
    for _ in 0..n {
        let purpose_id: u8 = r.read_fixed_integer(PURPOSE_ID)?;
        let value: u8 = r.read_fixed_integer(RESTRICTION_TYPE)?;
        let restriction_type =
            RestrictionType::from_u8(value).ok_or(DecodingError::ValueOutOfRange {
                value: value as u64,
                bits: RESTRICTION_TYPE,
            })?;
        let restriction = PurposeRestriction::new(purpose_id, restriction_type)?;

        for range in r.read_range_entries()? {
            for vendor_id in range {
                restrictions.add(vendor_id, restriction);
            }
        }
    }

    restrictions.set_bit_length(r.position() - start);
    Ok(restrictions)
}

/// Writes every restriction in key order, grouping consecutive vendor ids into ranges.
pub fn encode_purpose_restrictions(
    w: &mut DataWriter,
    restrictions: &PurposeRestrictionVector,
) -> Result<(), EncodingError> {
    w.write_fixed_integer(NUM_RESTRICTIONS, restrictions.num_restrictions() as u64)?;
    for (restriction, vendors) in restrictions.iter() {
        w.write_fixed_integer(PURPOSE_ID, restriction.purpose_id())?;
        w.write_fixed_integer(RESTRICTION_TYPE, restriction.restriction_type() as u8)?;
        w.write_range_entries(&group_ranges(vendors))?;
    }
    Ok(())
}
