//! The mutable record of a user's consent decisions.
use crate::core::truncate_to_deciseconds;
use crate::error::DecodingError;
use crate::gvl::{Gvl, Purpose};
use crate::model::{ModelError, PurposeRestrictionVector, Vector};
use crate::tc_string::TCString;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;

/// Highest protocol version supported.
pub const MAX_VERSION: u8 = 2;

/// A user's consent decisions along with the metadata describing how they were collected.
///
/// Metadata setters validate their input. Vectors are public and edited in place.
///
/// ```
/// use iab_tcf::TCModel;
///
/// let mut model = TCModel::new();
/// model.set_cmp_id(5).unwrap();
/// model.purpose_consents.set_all([1, 2, 3]).unwrap();
///
/// assert!(model.set_cmp_id(0).is_err());
/// assert!(model.set_consent_language("english").is_err());
/// assert!(!model.is_valid());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TCModel {
    version: u8,
    #[serde(with = "time::serde::rfc3339")]
    created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    last_updated: OffsetDateTime,
    cmp_id: Option<u16>,
    cmp_version: Option<u16>,
    consent_screen: Option<u8>,
    consent_language: String,
    vendor_list_version: Option<u16>,
    policy_version: Option<u8>,
    pub is_service_specific: bool,
    pub use_non_standard_stacks: bool,
    pub purpose_one_treatment: bool,
    publisher_country_code: String,
    pub special_feature_optins: Vector,
    pub purpose_consents: Vector,
    pub purpose_legitimate_interests: Vector,
    pub vendor_consents: Vector,
    pub vendor_legitimate_interests: Vector,
    pub vendors_disclosed: Vector,
    pub vendors_allowed: Vector,
    pub publisher_consents: Vector,
    pub publisher_legitimate_interests: Vector,
    pub publisher_custom_consents: Vector,
    pub publisher_custom_legitimate_interests: Vector,
    num_custom_purposes: u8,
    #[serde(skip)]
    assigned_num_custom_purposes: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_purposes: Option<BTreeMap<u8, Purpose>>,
    publisher_restrictions: PurposeRestrictionVector,
    #[serde(skip)]
    gvl: Option<Arc<Gvl>>,
}

impl Default for TCModel {
    fn default() -> Self {
        let now = truncate_to_deciseconds(OffsetDateTime::now_utc());
        Self {
            version: MAX_VERSION,
            created: now,
            last_updated: now,
            cmp_id: None,
            cmp_version: None,
            consent_screen: None,
            consent_language: "EN".to_string(),
            vendor_list_version: None,
            policy_version: None,
            is_service_specific: false,
            use_non_standard_stacks: false,
            purpose_one_treatment: false,
            publisher_country_code: "AA".to_string(),
            special_feature_optins: Vector::new(),
            purpose_consents: Vector::new(),
            purpose_legitimate_interests: Vector::new(),
            vendor_consents: Vector::new(),
            vendor_legitimate_interests: Vector::new(),
            vendors_disclosed: Vector::new(),
            vendors_allowed: Vector::new(),
            publisher_consents: Vector::new(),
            publisher_legitimate_interests: Vector::new(),
            publisher_custom_consents: Vector::new(),
            publisher_custom_legitimate_interests: Vector::new(),
            num_custom_purposes: 0,
            assigned_num_custom_purposes: 0,
            custom_purposes: None,
            publisher_restrictions: PurposeRestrictionVector::new(),
            gvl: None,
        }
    }
}

fn two_letter_code(field: &'static str, value: &str) -> Result<String, ModelError> {
    if value.len() == 2 && value.bytes().all(|b| b.is_ascii_alphabetic()) {
        Ok(value.to_ascii_uppercase())
    } else {
        Err(ModelError::invalid(field, value, "must be two letters"))
    }
}

impl TCModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn set_version(&mut self, version: u8) -> Result<(), ModelError> {
        if !(1..=MAX_VERSION).contains(&version) {
            return Err(ModelError::invalid(
                "version",
                version,
                "unsupported protocol version",
            ));
        }
        self.version = version;
        Ok(())
    }

    pub fn created(&self) -> OffsetDateTime {
        self.created
    }

    /// Sets the creation time, truncated to a tenth of a second.
    pub fn set_created(&mut self, created: OffsetDateTime) {
        self.created = truncate_to_deciseconds(created);
    }

    pub fn last_updated(&self) -> OffsetDateTime {
        self.last_updated
    }

    /// Sets the last update time, truncated to a tenth of a second.
    pub fn set_last_updated(&mut self, last_updated: OffsetDateTime) {
        self.last_updated = truncate_to_deciseconds(last_updated);
    }

    /// Marks the model as updated now.
    pub fn updated(&mut self) {
        self.set_last_updated(OffsetDateTime::now_utc());
    }

    pub fn cmp_id(&self) -> Option<u16> {
        self.cmp_id
    }

    pub fn set_cmp_id(&mut self, cmp_id: u16) -> Result<(), ModelError> {
        if cmp_id == 0 {
            return Err(ModelError::invalid("cmpId", cmp_id, "must be positive"));
        }
        self.cmp_id = Some(cmp_id);
        Ok(())
    }

    pub fn cmp_version(&self) -> Option<u16> {
        self.cmp_version
    }

    pub fn set_cmp_version(&mut self, cmp_version: u16) {
        self.cmp_version = Some(cmp_version);
    }

    pub fn consent_screen(&self) -> Option<u8> {
        self.consent_screen
    }

    pub fn set_consent_screen(&mut self, consent_screen: u8) {
        self.consent_screen = Some(consent_screen);
    }

    pub fn consent_language(&self) -> &str {
        &self.consent_language
    }

    /// Sets the language the consent UI was shown in, as two letters.
    pub fn set_consent_language(&mut self, lang: &str) -> Result<(), ModelError> {
        self.consent_language = two_letter_code("consentLanguage", lang)?;
        Ok(())
    }

    pub fn vendor_list_version(&self) -> Option<u16> {
        self.vendor_list_version
    }

    pub fn set_vendor_list_version(&mut self, version: u16) {
        self.vendor_list_version = Some(version);
    }

    pub fn policy_version(&self) -> Option<u8> {
        self.policy_version
    }

    pub fn set_policy_version(&mut self, version: u8) {
        self.policy_version = Some(version);
    }

    pub fn publisher_country_code(&self) -> &str {
        &self.publisher_country_code
    }

    /// Sets the country of the publisher, as two letters.
    pub fn set_publisher_country_code(&mut self, code: &str) -> Result<(), ModelError> {
        self.publisher_country_code = two_letter_code("publisherCountryCode", code)?;
        Ok(())
    }

    /// Number of custom purposes declared by the publisher.
    ///
    /// When custom purposes are defined this is the highest custom purpose id,
    /// so that every defined purpose fits in the encoded bitfields.
    pub fn num_custom_purposes(&self) -> u8 {
        self.num_custom_purposes
    }

    pub fn set_num_custom_purposes(&mut self, num: u8) {
        self.assigned_num_custom_purposes = num;
        self.refresh_num_custom_purposes();
    }

    pub fn custom_purposes(&self) -> Option<&BTreeMap<u8, Purpose>> {
        self.custom_purposes.as_ref()
    }

    pub fn set_custom_purposes(&mut self, purposes: Option<BTreeMap<u8, Purpose>>) {
        self.custom_purposes = purposes;
        self.refresh_num_custom_purposes();
    }

    fn refresh_num_custom_purposes(&mut self) {
        self.num_custom_purposes = match &self.custom_purposes {
            Some(purposes) => purposes.keys().last().copied().unwrap_or(0),
            None => self.assigned_num_custom_purposes,
        };
    }

    pub fn publisher_restrictions(&self) -> &PurposeRestrictionVector {
        &self.publisher_restrictions
    }

    pub fn publisher_restrictions_mut(&mut self) -> &mut PurposeRestrictionVector {
        &mut self.publisher_restrictions
    }

    /// Replaces the publisher restrictions, checking them against the attached
    /// vendor list if there is one.
    pub fn set_publisher_restrictions(
        &mut self,
        mut restrictions: PurposeRestrictionVector,
    ) -> Result<(), ModelError> {
        if let Some(gvl) = &self.gvl
            && restrictions.gvl().is_none()
        {
            restrictions.set_gvl(gvl.clone())?;
        }
        self.publisher_restrictions = restrictions;
        Ok(())
    }

    pub fn gvl(&self) -> Option<&Arc<Gvl>> {
        self.gvl.as_ref()
    }

    /// Attaches the vendor list the model is built against.
    ///
    /// The vendor list version, policy version and language of the list are copied
    /// into the model, and publisher restrictions it does not allow are dropped.
    /// A vendor list can be attached only once.
    pub fn set_gvl(&mut self, gvl: Arc<Gvl>) -> Result<(), ModelError> {
        if self.gvl.is_some() {
            return Err(ModelError::GvlAlreadySet);
        }

        self.set_consent_language(gvl.language())?;
        self.vendor_list_version = Some(gvl.vendor_list_version());
        self.policy_version = Some(gvl.tcf_policy_version());
        if self.publisher_restrictions.gvl().is_none() {
            self.publisher_restrictions.set_gvl(gvl.clone())?;
        }
        self.gvl = Some(gvl);
        Ok(())
    }

    fn require_gvl(&self, operation: &'static str) -> Result<Arc<Gvl>, ModelError> {
        self.gvl
            .clone()
            .ok_or(ModelError::MissingGvl { operation })
    }

    /// Gives consent to every vendor of the vendor list.
    pub fn set_all_vendor_consents(&mut self) -> Result<(), ModelError> {
        let gvl = self.require_gvl("set_all_vendor_consents")?;
        self.vendor_consents.set_all(gvl.vendor_ids())
    }

    pub fn unset_all_vendor_consents(&mut self) {
        self.vendor_consents.empty();
    }

    /// Establishes transparency for the legitimate interest of every vendor of the vendor list.
    pub fn set_all_vendor_legitimate_interests(&mut self) -> Result<(), ModelError> {
        let gvl = self.require_gvl("set_all_vendor_legitimate_interests")?;
        self.vendor_legitimate_interests.set_all(gvl.vendor_ids())
    }

    pub fn unset_all_vendor_legitimate_interests(&mut self) {
        self.vendor_legitimate_interests.empty();
    }

    /// Gives consent to every purpose of the vendor list.
    pub fn set_all_purpose_consents(&mut self) -> Result<(), ModelError> {
        let gvl = self.require_gvl("set_all_purpose_consents")?;
        self.purpose_consents
            .set_all(gvl.purposes().keys().map(|&id| u16::from(id)))
    }

    pub fn unset_all_purpose_consents(&mut self) {
        self.purpose_consents.empty();
    }

    /// Establishes transparency for the legitimate interest of every purpose of the vendor list.
    pub fn set_all_purpose_legitimate_interests(&mut self) -> Result<(), ModelError> {
        let gvl = self.require_gvl("set_all_purpose_legitimate_interests")?;
        self.purpose_legitimate_interests
            .set_all(gvl.purposes().keys().map(|&id| u16::from(id)))
    }

    pub fn unset_all_purpose_legitimate_interests(&mut self) {
        self.purpose_legitimate_interests.empty();
    }

    /// Opts in to every special feature of the vendor list.
    pub fn set_all_special_feature_optins(&mut self) -> Result<(), ModelError> {
        let gvl = self.require_gvl("set_all_special_feature_optins")?;
        self.special_feature_optins
            .set_all(gvl.special_features().keys().map(|&id| u16::from(id)))
    }

    pub fn unset_all_special_feature_optins(&mut self) {
        self.special_feature_optins.empty();
    }

    /// Sets every vendor and purpose consent, legitimate interest and special feature opt-in.
    pub fn set_all(&mut self) -> Result<(), ModelError> {
        self.require_gvl("set_all")?;
        self.set_all_vendor_consents()?;
        self.set_all_vendor_legitimate_interests()?;
        self.set_all_purpose_consents()?;
        self.set_all_purpose_legitimate_interests()?;
        self.set_all_special_feature_optins()
    }

    pub fn unset_all(&mut self) {
        self.unset_all_vendor_consents();
        self.unset_all_vendor_legitimate_interests();
        self.unset_all_purpose_consents();
        self.unset_all_purpose_legitimate_interests();
        self.unset_all_special_feature_optins();
    }

    /// Whether every metadata field required to encode the model has been assigned.
    pub fn is_valid(&self) -> bool {
        self.cmp_id.is_some()
            && self.cmp_version.is_some()
            && self.consent_screen.is_some()
            && self.vendor_list_version.is_some()
            && (self.version < 2 || self.policy_version.is_some())
    }

    /// Whether the model holds anything which belongs in the publisher segment.
    pub(crate) fn has_publisher_data(&self) -> bool {
        !self.publisher_consents.is_empty()
            || !self.publisher_legitimate_interests.is_empty()
            || !self.publisher_custom_consents.is_empty()
            || !self.publisher_custom_legitimate_interests.is_empty()
            || self.num_custom_purposes > 0
    }
}

impl FromStr for TCModel {
    type Err = DecodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TCString::parse_str(s)?.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use time::macros::datetime;

    fn gvl() -> Arc<Gvl> {
        Arc::new(Gvl::from_str(include_str!("../tests/data/vendor-list.json")).unwrap())
    }

    fn test_purpose(id: u8) -> Purpose {
        Purpose {
            id,
            name: format!("Custom purpose {id}"),
            description: String::new(),
            description_legal: String::new(),
        }
    }

    #[test]
    fn defaults() {
        let model = TCModel::new();
        assert_eq!(model.version(), 2);
        assert_eq!(model.consent_language(), "EN");
        assert_eq!(model.publisher_country_code(), "AA");
        assert_eq!(model.created(), model.last_updated());
        assert_eq!(model.created().nanosecond() % 100_000_000, 0);
        assert!(model.gvl().is_none());
        assert!(!model.is_valid());
    }

    #[test_case(0 => matches Err(ModelError::InvalidValue { field: "version", .. }) ; "zero")]
    #[test_case(1 => Ok(()) ; "one")]
    #[test_case(2 => Ok(()) ; "two")]
    #[test_case(3 => matches Err(ModelError::InvalidValue { field: "version", .. }) ; "three")]
    fn version(v: u8) -> Result<(), ModelError> {
        TCModel::new().set_version(v)
    }

    #[test]
    fn cmp_id_must_be_positive() {
        let mut model = TCModel::new();
        assert_eq!(
            model.set_cmp_id(0),
            Err(ModelError::InvalidValue {
                field: "cmpId",
                value: "0".to_string(),
                reason: "must be positive"
            })
        );
        model.set_cmp_id(1).unwrap();
        assert_eq!(model.cmp_id(), Some(1));
    }

    #[test_case("fr" => Ok("FR".to_string()) ; "lowercase")]
    #[test_case("De" => Ok("DE".to_string()) ; "mixed case")]
    #[test_case("F" => matches Err(_) ; "single letter")]
    #[test_case("FRA" => matches Err(_) ; "three letters")]
    #[test_case("F1" => matches Err(_) ; "digit")]
    #[test_case("[]" => matches Err(_) ; "brackets")]
    fn consent_language(lang: &str) -> Result<String, ModelError> {
        let mut model = TCModel::new();
        model.set_consent_language(lang)?;
        Ok(model.consent_language().to_string())
    }

    #[test]
    fn publisher_country_code() {
        let mut model = TCModel::new();
        model.set_publisher_country_code("de").unwrap();
        assert_eq!(model.publisher_country_code(), "DE");
        assert!(model.set_publisher_country_code("D").is_err());
        assert_eq!(model.publisher_country_code(), "DE");
    }

    #[test]
    fn timestamps_are_truncated() {
        let mut model = TCModel::new();
        model.set_created(datetime!(2020-02-21 00:37:39.345 UTC));
        assert_eq!(model.created(), datetime!(2020-02-21 00:37:39.3 UTC));

        model.set_last_updated(datetime!(2020-02-21 00:37:39.345 UTC));
        model.updated();
        assert!(model.last_updated() > model.created());
    }

    #[test]
    fn num_custom_purposes_follows_custom_purposes() {
        let mut model = TCModel::new();
        model.set_num_custom_purposes(2);
        assert_eq!(model.num_custom_purposes(), 2);

        model.set_custom_purposes(Some(BTreeMap::from([
            (1, test_purpose(1)),
            (6, test_purpose(6)),
        ])));
        assert_eq!(model.num_custom_purposes(), 6);

        model.set_custom_purposes(None);
        assert_eq!(model.num_custom_purposes(), 2);
    }

    #[test]
    fn set_gvl_propagates() {
        let mut model = TCModel::new();
        model.set_consent_language("fr").unwrap();
        model.set_gvl(gvl()).unwrap();

        assert_eq!(model.vendor_list_version(), Some(126));
        assert_eq!(model.policy_version(), Some(2));
        assert_eq!(model.consent_language(), "EN");
        assert!(model.publisher_restrictions().gvl().is_some());
    }

    #[test]
    fn set_gvl_once() {
        let mut model = TCModel::new();
        model.set_gvl(gvl()).unwrap();
        assert_eq!(model.set_gvl(gvl()), Err(ModelError::GvlAlreadySet));
    }

    #[test]
    fn set_gvl_prunes_restrictions() {
        use crate::model::{PurposeRestriction, RestrictionType};

        let mut model = TCModel::new();
        let not_allowed = PurposeRestriction::new(1, RestrictionType::NotAllowed).unwrap();
        model.publisher_restrictions_mut().add(1, not_allowed);
        model.publisher_restrictions_mut().add(3, not_allowed);

        model.set_gvl(gvl()).unwrap();
        assert_eq!(model.publisher_restrictions().vendors(None), vec![1]);
    }

    #[test]
    fn set_all_requires_gvl() {
        let mut model = TCModel::new();
        assert!(matches!(
            model.set_all_vendor_consents(),
            Err(ModelError::MissingGvl {
                operation: "set_all_vendor_consents"
            })
        ));
        assert!(matches!(
            model.set_all(),
            Err(ModelError::MissingGvl { operation: "set_all" })
        ));
        assert!(model.vendor_consents.is_empty());
    }

    #[test]
    fn set_all_and_unset_all() {
        let mut model = TCModel::new();
        model.set_gvl(gvl()).unwrap();
        model.set_all().unwrap();

        assert_eq!(
            model.vendor_consents.iter().collect::<Vec<_>>(),
            vec![1, 2, 4, 6, 8, 11, 12]
        );
        assert_eq!(model.vendor_legitimate_interests.size(), 7);
        assert_eq!(model.purpose_consents.max_id(), 10);
        assert_eq!(model.purpose_legitimate_interests.size(), 10);
        assert_eq!(
            model.special_feature_optins.iter().collect::<Vec<_>>(),
            vec![1, 2]
        );

        model.unset_all();
        assert!(model.vendor_consents.is_empty());
        assert!(model.vendor_legitimate_interests.is_empty());
        assert!(model.purpose_consents.is_empty());
        assert!(model.purpose_legitimate_interests.is_empty());
        assert!(model.special_feature_optins.is_empty());
    }

    #[test]
    fn set_all_respects_narrowing() {
        let mut gvl = Gvl::from_str(include_str!("../tests/data/vendor-list.json")).unwrap();
        gvl.narrow_vendors_to([2, 4]);

        let mut model = TCModel::new();
        model.set_gvl(Arc::new(gvl)).unwrap();
        model.set_all_vendor_consents().unwrap();
        assert_eq!(model.vendor_consents.iter().collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test_case(1, false => true ; "version 1 does not need a policy version")]
    #[test_case(2, false => false ; "version 2 needs a policy version")]
    #[test_case(2, true => true ; "version 2 complete")]
    fn validity(version: u8, with_policy: bool) -> bool {
        let mut model = TCModel::new();
        model.set_version(version).unwrap();
        model.set_cmp_id(10).unwrap();
        model.set_cmp_version(2);
        model.set_consent_screen(0);
        model.set_vendor_list_version(126);
        if with_policy {
            model.set_policy_version(2);
        }
        model.is_valid()
    }

    #[test]
    fn clone_is_independent() {
        let mut model = TCModel::new();
        model.set_gvl(gvl()).unwrap();
        model.vendor_consents.set(1).unwrap();

        let mut copy = model.clone();
        copy.vendor_consents.set(2).unwrap();

        assert!(!model.vendor_consents.has(2));
        assert!(Arc::ptr_eq(model.gvl().unwrap(), copy.gvl().unwrap()));
    }
}
