//! Publisher restrictions: per-purpose overrides of the legal basis a vendor may rely on.
use crate::gvl::Gvl;
use crate::model::ModelError;
use num_derive::FromPrimitive;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::sync::Arc;
use strum_macros::Display;
use tracing::debug;

/// The kind of override a publisher applies to a purpose.
#[derive(
    Clone, Copy, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash, FromPrimitive, Serialize,
)]
pub enum RestrictionType {
    /// The vendor may not process data for the purpose at all.
    NotAllowed = 0,
    /// The vendor must rely on consent.
    RequireConsent = 1,
    /// The vendor must rely on legitimate interest.
    RequireLegitimateInterest = 2,
    /// Reserved wire value.
    Undefined = 3,
}

/// A purpose and the restriction applied to it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurposeRestriction {
    purpose_id: u8,
    restriction_type: RestrictionType,
}

impl PurposeRestriction {
    pub fn new(purpose_id: u8, restriction_type: RestrictionType) -> Result<Self, ModelError> {
        if purpose_id == 0 {
            return Err(ModelError::invalid(
                "purpose restriction id",
                purpose_id,
                "purpose ids start at 1",
            ));
        }
        Ok(Self {
            purpose_id,
            restriction_type,
        })
    }

    pub fn purpose_id(&self) -> u8 {
        self.purpose_id
    }

    pub fn restriction_type(&self) -> RestrictionType {
        self.restriction_type
    }

    /// Every restriction key of a purpose, in key order.
    fn of_purpose(purpose_id: u8) -> RangeInclusive<Self> {
        let first = Self {
            purpose_id,
            restriction_type: RestrictionType::NotAllowed,
        };
        let last = Self {
            purpose_id,
            restriction_type: RestrictionType::Undefined,
        };
        first..=last
    }
}

/// An ordered association between purpose restrictions and the vendors they apply to.
///
/// A vendor holds at most one restriction per purpose: adding a restriction replaces any
/// other restriction the vendor had for the same purpose.
///
/// Once a vendor list is attached, additions which the vendor's declarations do not allow
/// are ignored. Without a vendor list every addition is accepted, and the illegal ones
/// are pruned when a list is attached later.
#[derive(Clone, Debug, Default)]
pub struct PurposeRestrictionVector {
    restrictions: BTreeMap<PurposeRestriction, BTreeSet<u16>>,
    gvl: Option<Arc<Gvl>>,
    bit_length: Option<u64>,
}

impl PurposeRestrictionVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts a vendor, returning whether the restriction was accepted.
    ///
    /// Vendor ids start at 1: vendor 0 is never accepted.
    pub fn add(&mut self, vendor_id: u16, restriction: PurposeRestriction) -> bool {
        if vendor_id == 0 || !is_ok_to_have(self.gvl.as_deref(), vendor_id, &restriction) {
            return false;
        }

        let previous = self
            .restrictions
            .range(PurposeRestriction::of_purpose(restriction.purpose_id))
            .filter(|(r, vendors)| **r != restriction && vendors.contains(&vendor_id))
            .map(|(r, _)| *r)
            .collect::<Vec<_>>();
        for r in previous {
            self.remove(vendor_id, &r);
        }

        self.restrictions
            .entry(restriction)
            .or_default()
            .insert(vendor_id);
        self.bit_length = None;
        true
    }

    /// Lifts a restriction from a vendor, returning whether it was present.
    pub fn remove(&mut self, vendor_id: u16, restriction: &PurposeRestriction) -> bool {
        let Some(vendors) = self.restrictions.get_mut(restriction) else {
            return false;
        };

        let removed = vendors.remove(&vendor_id);
        if vendors.is_empty() {
            self.restrictions.remove(restriction);
        }
        if removed {
            self.bit_length = None;
        }
        removed
    }

    /// Lists the restrictions applied to a vendor, or every restriction present.
    pub fn restrictions(&self, vendor_id: Option<u16>) -> Vec<PurposeRestriction> {
        self.restrictions
            .iter()
            .filter(|(_, vendors)| vendor_id.is_none_or(|id| vendors.contains(&id)))
            .map(|(r, _)| *r)
            .collect()
    }

    /// Lists the vendors under a restriction, or every restricted vendor, in ascending order.
    pub fn vendors(&self, restriction: Option<&PurposeRestriction>) -> Vec<u16> {
        match restriction {
            Some(r) => self
                .restrictions
                .get(r)
                .map(|vendors| vendors.iter().copied().collect())
                .unwrap_or_default(),
            None => self
                .restrictions
                .values()
                .flatten()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }

    /// The restriction a vendor is under for a purpose, if any.
    pub fn restriction_type(&self, vendor_id: u16, purpose_id: u8) -> Option<RestrictionType> {
        self.restrictions
            .range(PurposeRestriction::of_purpose(purpose_id))
            .find(|(_, vendors)| vendors.contains(&vendor_id))
            .map(|(r, _)| r.restriction_type)
    }

    /// Number of distinct restrictions with at least one vendor.
    pub fn num_restrictions(&self) -> usize {
        self.restrictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restrictions.is_empty()
    }

    /// Iterates over restrictions in key order, with their vendors.
    pub fn iter(&self) -> impl Iterator<Item = (&PurposeRestriction, &BTreeSet<u16>)> {
        self.restrictions.iter()
    }

    /// Number of bits this structure occupied in the string it was decoded from.
    pub fn bit_length(&self) -> Option<u64> {
        self.bit_length
    }

    pub(crate) fn set_bit_length(&mut self, bit_length: u64) {
        self.bit_length = Some(bit_length);
    }

    pub fn gvl(&self) -> Option<&Arc<Gvl>> {
        self.gvl.as_ref()
    }

    /// Attaches the vendor list restrictions are checked against, pruning the ones it
    /// does not allow. A vendor list can be attached only once.
    pub fn set_gvl(&mut self, gvl: Arc<Gvl>) -> Result<(), ModelError> {
        if self.gvl.is_some() {
            return Err(ModelError::GvlAlreadySet);
        }

        let mut pruned = 0;
        self.restrictions.retain(|restriction, vendors| {
            let before = vendors.len();
            vendors.retain(|&vendor_id| is_ok_to_have(Some(&*gvl), vendor_id, restriction));
            pruned += before - vendors.len();
            !vendors.is_empty()
        });
        if pruned > 0 {
            debug!(pruned, "removed restrictions not allowed by the vendor list");
            self.bit_length = None;
        }

        self.gvl = Some(gvl);
        Ok(())
    }
}

fn is_ok_to_have(gvl: Option<&Gvl>, vendor_id: u16, restriction: &PurposeRestriction) -> bool {
    let Some(gvl) = gvl else {
        return true;
    };
    let Some(vendor) = gvl.vendor(vendor_id) else {
        return false;
    };

    let purpose_id = restriction.purpose_id;
    match restriction.restriction_type {
        RestrictionType::NotAllowed => {
            vendor.purposes.contains(&purpose_id) || vendor.leg_int_purposes.contains(&purpose_id)
        }
        RestrictionType::Undefined => false,
        _ if vendor.flexible_purposes.is_empty() => true,
        RestrictionType::RequireConsent => {
            vendor.flexible_purposes.contains(&purpose_id)
                && vendor.leg_int_purposes.contains(&purpose_id)
        }
        RestrictionType::RequireLegitimateInterest => {
            vendor.flexible_purposes.contains(&purpose_id) && vendor.purposes.contains(&purpose_id)
        }
    }
}

impl PartialEq for PurposeRestrictionVector {
    fn eq(&self, other: &Self) -> bool {
        self.restrictions == other.restrictions
    }
}

struct Entry<'a>(&'a PurposeRestriction, &'a BTreeSet<u16>);

impl Serialize for Entry<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("PurposeRestriction", 3)?;
        s.serialize_field("purposeId", &self.0.purpose_id)?;
        s.serialize_field("restrictionType", &self.0.restriction_type)?;
        s.serialize_field("vendors", self.1)?;
        s.end()
    }
}

impl Serialize for PurposeRestrictionVector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.restrictions.iter().map(|(r, v)| Entry(r, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;
    use RestrictionType::*;

    fn gvl() -> Arc<Gvl> {
        Arc::new(Gvl::from_str(include_str!("../../tests/data/vendor-list.json")).unwrap())
    }

    fn pr(purpose_id: u8, restriction_type: RestrictionType) -> PurposeRestriction {
        PurposeRestriction::new(purpose_id, restriction_type).unwrap()
    }

    fn with_gvl() -> PurposeRestrictionVector {
        let mut prv = PurposeRestrictionVector::new();
        prv.set_gvl(gvl()).unwrap();
        prv
    }

    #[test]
    fn purpose_zero_is_rejected() {
        assert!(PurposeRestriction::new(0, NotAllowed).is_err());
    }

    #[test]
    fn add_without_gvl_accepts_everything() {
        let mut prv = PurposeRestrictionVector::new();
        assert!(prv.add(3, pr(1, NotAllowed)));
        assert!(prv.add(999, pr(2, Undefined)));
        assert!(!prv.add(0, pr(1, NotAllowed)));
        assert_eq!(prv.num_restrictions(), 2);
        assert_eq!(prv.vendors(None), vec![3, 999]);
    }

    #[test]
    fn last_restriction_wins() {
        let mut prv = PurposeRestrictionVector::new();
        prv.add(1, pr(2, NotAllowed));
        prv.add(1, pr(2, RequireConsent));
        prv.add(1, pr(3, NotAllowed));

        assert_eq!(prv.restriction_type(1, 2), Some(RequireConsent));
        assert_eq!(prv.restriction_type(1, 3), Some(NotAllowed));
        assert_eq!(
            prv.restrictions(Some(1)),
            vec![pr(2, RequireConsent), pr(3, NotAllowed)]
        );
        // the emptied key is gone
        assert_eq!(prv.num_restrictions(), 2);
    }

    #[test]
    fn exclusivity_holds_for_every_pair() {
        let types = [NotAllowed, RequireConsent, RequireLegitimateInterest, Undefined];
        for first in types {
            for second in types {
                let mut prv = PurposeRestrictionVector::new();
                prv.add(5, pr(4, first));
                prv.add(5, pr(4, second));
                assert_eq!(prv.restrictions(Some(5)), vec![pr(4, second)]);
            }
        }
    }

    #[test]
    fn restriction_type_ignores_other_purposes() {
        let mut prv = PurposeRestrictionVector::new();
        prv.add(3, pr(1, RequireLegitimateInterest));
        prv.add(3, pr(3, NotAllowed));
        prv.add(5, pr(2, RequireConsent));

        assert_eq!(prv.restriction_type(3, 2), None);
        assert_eq!(prv.restriction_type(5, 2), Some(RequireConsent));
        assert_eq!(prv.restriction_type(5, 1), None);
    }

    #[test]
    fn remove() {
        let mut prv = PurposeRestrictionVector::new();
        prv.add(1, pr(2, NotAllowed));
        prv.add(4, pr(2, NotAllowed));

        assert!(prv.remove(1, &pr(2, NotAllowed)));
        assert!(!prv.remove(1, &pr(2, NotAllowed)));
        assert_eq!(prv.vendors(Some(&pr(2, NotAllowed))), vec![4]);

        assert!(prv.remove(4, &pr(2, NotAllowed)));
        assert!(prv.is_empty());
    }

    #[test]
    fn vendors_of_unknown_restriction() {
        let prv = PurposeRestrictionVector::new();
        assert!(prv.vendors(Some(&pr(1, NotAllowed))).is_empty());
        assert_eq!(prv.restriction_type(1, 1), None);
    }

    // vendor 1: consent [1, 2, 3, 4], legitimate interest [7, 9, 10], flexible [2, 7]
    #[test_case(1, 1, NotAllowed => true ; "not allowed on consent purpose")]
    #[test_case(1, 9, NotAllowed => true ; "not allowed on legitimate interest purpose")]
    #[test_case(1, 5, NotAllowed => false ; "not allowed on undeclared purpose")]
    #[test_case(1, 7, RequireConsent => true ; "require consent on flexible legitimate interest")]
    #[test_case(1, 2, RequireConsent => false ; "require consent on flexible consent purpose")]
    #[test_case(1, 9, RequireConsent => false ; "require consent on rigid purpose")]
    #[test_case(1, 2, RequireLegitimateInterest => true ; "require li on flexible consent purpose")]
    #[test_case(1, 7, RequireLegitimateInterest => false ; "require li on flexible li purpose")]
    #[test_case(1, 3, RequireLegitimateInterest => false ; "require li on rigid purpose")]
    #[test_case(1, 1, Undefined => false ; "undefined")]
    #[test_case(2, 1, RequireConsent => true ; "vendor without flexible purposes")]
    #[test_case(2, 1, Undefined => false ; "undefined for vendor without flexible purposes")]
    #[test_case(10, 1, NotAllowed => false ; "deleted vendor")]
    #[test_case(3, 1, NotAllowed => false ; "unknown vendor")]
    fn legality(vendor_id: u16, purpose_id: u8, restriction_type: RestrictionType) -> bool {
        let mut prv = with_gvl();
        let accepted = prv.add(vendor_id, pr(purpose_id, restriction_type));
        assert_eq!(accepted, !prv.is_empty());
        accepted
    }

    #[test]
    fn attaching_gvl_prunes() {
        let mut prv = PurposeRestrictionVector::new();
        prv.add(1, pr(1, NotAllowed));
        prv.add(1, pr(5, NotAllowed));
        prv.add(3, pr(1, NotAllowed));
        prv.add(1, pr(2, RequireLegitimateInterest));
        prv.set_bit_length(120);

        prv.set_gvl(gvl()).unwrap();

        assert_eq!(
            prv.restrictions(None),
            vec![pr(1, NotAllowed), pr(2, RequireLegitimateInterest)]
        );
        assert_eq!(prv.vendors(None), vec![1]);
        assert_eq!(prv.bit_length(), None);
    }

    #[test]
    fn gvl_is_attached_once() {
        let mut prv = with_gvl();
        assert_eq!(prv.set_gvl(gvl()), Err(ModelError::GvlAlreadySet));
    }

    #[test]
    fn serialize() {
        let mut prv = PurposeRestrictionVector::new();
        prv.add(4, pr(2, RequireConsent));
        prv.add(1, pr(2, RequireConsent));
        assert_eq!(
            serde_json::to_value(&prv).unwrap(),
            serde_json::json!([
                { "purposeId": 2, "restrictionType": "RequireConsent", "vendors": [1, 4] }
            ])
        );
    }
}
