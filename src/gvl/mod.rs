//! The Global Vendor List: the catalog of purposes, features and vendors which governs
//! which consent combinations are legal.
//!
//! A [`Gvl`] is ready as soon as it exists. It can be built from an in-memory
//! [`VendorList`] or JSON document, or obtained through a [`GvlLoader`] which fetches
//! and caches published lists.
//!
//! ```
//! use iab_tcf::gvl::Gvl;
//! use std::str::FromStr;
//!
//! let gvl = Gvl::from_str(r#"{
//!     "gvlSpecificationVersion": 2,
//!     "vendorListVersion": 5,
//!     "tcfPolicyVersion": 2,
//!     "lastUpdated": "2020-05-28T16:00:23Z",
//!     "vendors": {
//!         "8": { "id": 8, "name": "Emerse", "purposes": [1, 3], "legIntPurposes": [2] }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(gvl.vendor_list_version(), 5);
//! assert!(gvl.vendors_with_consent_purpose(3).contains(&8));
//! assert!(gvl.vendors_with_leg_int_purpose(2).contains(&8));
//! ```
use crate::gvl::loader::FetchError;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

pub mod loader;
pub mod types;

pub use loader::{Fetch, GvlCache, GvlLoader, GvlLoaderConfig};
pub use types::{Declarations, Feature, Purpose, Stack, Vendor, VendorList};

static NO_VENDORS: BTreeSet<u16> = BTreeSet::new();

/// The error type for failures to obtain a vendor list.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GvlError {
    /// Network-backed loading needs a base URL.
    #[error("a base URL is required to load vendor lists")]
    MissingBaseUrl,
    /// The canonical vendor list host must not be used directly.
    #[error("loading vendor lists from {0} is not allowed, host a copy instead")]
    DisallowedBaseUrl(String),
    /// The document could not be fetched.
    #[error("unable to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    /// The document is not a valid vendor list.
    #[error("invalid vendor list: {0}")]
    Json(#[from] serde_json::Error),
    /// Declarations are not published in the requested language.
    #[error("unsupported language {0}")]
    UnsupportedLanguage(String),
}

/// Vendors grouped by the legal basis they declare for a purpose.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct PurposeVendors {
    consent: BTreeSet<u16>,
    leg_int: BTreeSet<u16>,
    flexible: BTreeSet<u16>,
}

/// A populated vendor list along with its vendor indexes.
///
/// Deleted vendors are kept in the full vendor list but excluded from
/// [`vendors`](Self::vendors) and from every index.
#[derive(Clone, Debug, PartialEq)]
pub struct Gvl {
    gvl_specification_version: u8,
    vendor_list_version: u16,
    tcf_policy_version: u8,
    last_updated: OffsetDateTime,
    language: String,
    purposes: BTreeMap<u8, Purpose>,
    special_purposes: BTreeMap<u8, Purpose>,
    features: BTreeMap<u8, Feature>,
    special_features: BTreeMap<u8, Feature>,
    stacks: BTreeMap<u16, Stack>,
    full_vendor_list: BTreeMap<u16, Vendor>,
    vendors: BTreeMap<u16, Vendor>,
    by_purpose: BTreeMap<u8, PurposeVendors>,
    by_special_purpose: BTreeMap<u8, BTreeSet<u16>>,
    by_feature: BTreeMap<u8, BTreeSet<u16>>,
    by_special_feature: BTreeMap<u8, BTreeSet<u16>>,
}

/// Language of the declarations shipped inside `vendor-list.json`.
pub const DEFAULT_LANGUAGE: &str = "EN";

impl Gvl {
    pub fn new(list: VendorList) -> Self {
        let mut gvl = Self {
            gvl_specification_version: list.gvl_specification_version,
            vendor_list_version: list.vendor_list_version,
            tcf_policy_version: list.tcf_policy_version,
            last_updated: list.last_updated,
            language: DEFAULT_LANGUAGE.to_string(),
            purposes: list.purposes,
            special_purposes: list.special_purposes,
            features: list.features,
            special_features: list.special_features,
            stacks: list.stacks,
            full_vendor_list: list.vendors,
            vendors: BTreeMap::new(),
            by_purpose: BTreeMap::new(),
            by_special_purpose: BTreeMap::new(),
            by_feature: BTreeMap::new(),
            by_special_feature: BTreeMap::new(),
        };
        gvl.map_vendors(None);
        gvl
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, GvlError> {
        Ok(Self::new(serde_json::from_value(value)?))
    }

    /// Rebuilds the active vendors and the indexes from the full vendor list,
    /// keeping only `ids` when given.
    fn map_vendors(&mut self, ids: Option<&BTreeSet<u16>>) {
        self.vendors = self
            .full_vendor_list
            .iter()
            .filter(|(id, vendor)| !vendor.is_deleted() && ids.is_none_or(|ids| ids.contains(id)))
            .map(|(id, vendor)| (*id, vendor.clone()))
            .collect();

        self.by_purpose = self
            .purposes
            .keys()
            .map(|&id| (id, PurposeVendors::default()))
            .collect();
        self.by_special_purpose = index_keys(&self.special_purposes);
        self.by_feature = index_keys(&self.features);
        self.by_special_feature = index_keys(&self.special_features);

        for (&id, vendor) in &self.vendors {
            for &p in &vendor.purposes {
                self.by_purpose.entry(p).or_default().consent.insert(id);
            }
            for &p in &vendor.leg_int_purposes {
                self.by_purpose.entry(p).or_default().leg_int.insert(id);
            }
            for &p in &vendor.flexible_purposes {
                self.by_purpose.entry(p).or_default().flexible.insert(id);
            }
            index_vendor(&mut self.by_special_purpose, &vendor.special_purposes, id);
            index_vendor(&mut self.by_feature, &vendor.features, id);
            index_vendor(&mut self.by_special_feature, &vendor.special_features, id);
        }
    }

    /// Restricts the active vendors to the given ids.
    ///
    /// The full vendor list is kept, so narrowing again to a wider set is possible.
    pub fn narrow_vendors_to<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = u16>,
    {
        let ids = ids.into_iter().collect::<BTreeSet<_>>();
        self.map_vendors(Some(&ids));
        debug!(
            requested = ids.len(),
            kept = self.vendors.len(),
            "narrowed vendor list"
        );
    }

    pub fn gvl_specification_version(&self) -> u8 {
        self.gvl_specification_version
    }

    pub fn vendor_list_version(&self) -> u16 {
        self.vendor_list_version
    }

    pub fn tcf_policy_version(&self) -> u8 {
        self.tcf_policy_version
    }

    pub fn last_updated(&self) -> OffsetDateTime {
        self.last_updated
    }

    /// Language of the purpose, feature and stack texts, uppercase.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn purposes(&self) -> &BTreeMap<u8, Purpose> {
        &self.purposes
    }

    pub fn special_purposes(&self) -> &BTreeMap<u8, Purpose> {
        &self.special_purposes
    }

    pub fn features(&self) -> &BTreeMap<u8, Feature> {
        &self.features
    }

    pub fn special_features(&self) -> &BTreeMap<u8, Feature> {
        &self.special_features
    }

    pub fn stacks(&self) -> &BTreeMap<u16, Stack> {
        &self.stacks
    }

    /// Active vendors: not deleted, and within the narrowed set if any.
    pub fn vendors(&self) -> &BTreeMap<u16, Vendor> {
        &self.vendors
    }

    pub fn vendor_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.vendors.keys().copied()
    }

    /// Looks up an active vendor.
    pub fn vendor(&self, id: u16) -> Option<&Vendor> {
        self.vendors.get(&id)
    }

    /// Every vendor of the list, deleted and narrowed out ones included.
    pub fn full_vendor_list(&self) -> &BTreeMap<u16, Vendor> {
        &self.full_vendor_list
    }

    pub fn vendors_with_consent_purpose(&self, purpose_id: u8) -> &BTreeSet<u16> {
        self.by_purpose
            .get(&purpose_id)
            .map_or(&NO_VENDORS, |v| &v.consent)
    }

    pub fn vendors_with_leg_int_purpose(&self, purpose_id: u8) -> &BTreeSet<u16> {
        self.by_purpose
            .get(&purpose_id)
            .map_or(&NO_VENDORS, |v| &v.leg_int)
    }

    pub fn vendors_with_flexible_purpose(&self, purpose_id: u8) -> &BTreeSet<u16> {
        self.by_purpose
            .get(&purpose_id)
            .map_or(&NO_VENDORS, |v| &v.flexible)
    }

    pub fn vendors_with_special_purpose(&self, special_purpose_id: u8) -> &BTreeSet<u16> {
        self.by_special_purpose
            .get(&special_purpose_id)
            .unwrap_or(&NO_VENDORS)
    }

    pub fn vendors_with_feature(&self, feature_id: u8) -> &BTreeSet<u16> {
        self.by_feature.get(&feature_id).unwrap_or(&NO_VENDORS)
    }

    pub fn vendors_with_special_feature(&self, special_feature_id: u8) -> &BTreeSet<u16> {
        self.by_special_feature
            .get(&special_feature_id)
            .unwrap_or(&NO_VENDORS)
    }

    /// The vendor list as a document, with the full vendor list.
    pub fn to_vendor_list(&self) -> VendorList {
        VendorList {
            gvl_specification_version: self.gvl_specification_version,
            vendor_list_version: self.vendor_list_version,
            tcf_policy_version: self.tcf_policy_version,
            last_updated: self.last_updated,
            purposes: self.purposes.clone(),
            special_purposes: self.special_purposes.clone(),
            features: self.features.clone(),
            special_features: self.special_features.clone(),
            stacks: self.stacks.clone(),
            vendors: self.full_vendor_list.clone(),
        }
    }

    /// The vendor list as JSON, with the full vendor list.
    pub fn get_json(&self) -> Result<serde_json::Value, GvlError> {
        Ok(serde_json::to_value(self.to_vendor_list())?)
    }

    pub(crate) fn declarations(&self) -> Declarations {
        Declarations {
            gvl_specification_version: self.gvl_specification_version,
            vendor_list_version: self.vendor_list_version,
            tcf_policy_version: self.tcf_policy_version,
            last_updated: self.last_updated,
            purposes: self.purposes.clone(),
            special_purposes: self.special_purposes.clone(),
            features: self.features.clone(),
            special_features: self.special_features.clone(),
            stacks: self.stacks.clone(),
        }
    }

    /// Swaps the texts of purposes, features and stacks.
    pub(crate) fn set_declarations(&mut self, language: &str, declarations: Declarations) {
        self.language = language.to_ascii_uppercase();
        self.purposes = declarations.purposes;
        self.special_purposes = declarations.special_purposes;
        self.features = declarations.features;
        self.special_features = declarations.special_features;
        self.stacks = declarations.stacks;
    }
}

impl FromStr for Gvl {
    type Err = GvlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(serde_json::from_str(s)?))
    }
}

impl From<VendorList> for Gvl {
    fn from(list: VendorList) -> Self {
        Self::new(list)
    }
}

fn index_keys<T>(m: &BTreeMap<u8, T>) -> BTreeMap<u8, BTreeSet<u16>> {
    m.keys().map(|&id| (id, BTreeSet::new())).collect()
}

fn index_vendor(index: &mut BTreeMap<u8, BTreeSet<u16>>, ids: &[u8], vendor_id: u16) {
    for &id in ids {
        index.entry(id).or_default().insert(vendor_id);
    }
}
