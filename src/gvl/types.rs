//! JSON shapes of the Global Vendor List and of its translations.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// A complete vendor list document, as published under `vendor-list.json`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorList {
    pub gvl_specification_version: u8,
    pub vendor_list_version: u16,
    pub tcf_policy_version: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(default)]
    pub purposes: BTreeMap<u8, Purpose>,
    #[serde(default)]
    pub special_purposes: BTreeMap<u8, Purpose>,
    #[serde(default)]
    pub features: BTreeMap<u8, Feature>,
    #[serde(default)]
    pub special_features: BTreeMap<u8, Feature>,
    #[serde(default)]
    pub stacks: BTreeMap<u16, Stack>,
    #[serde(default)]
    pub vendors: BTreeMap<u16, Vendor>,
}

/// The language-dependent part of a vendor list, as published under `purposes-[lang].json`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Declarations {
    pub gvl_specification_version: u8,
    pub vendor_list_version: u16,
    pub tcf_policy_version: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(default)]
    pub purposes: BTreeMap<u8, Purpose>,
    #[serde(default)]
    pub special_purposes: BTreeMap<u8, Purpose>,
    #[serde(default)]
    pub features: BTreeMap<u8, Feature>,
    #[serde(default)]
    pub special_features: BTreeMap<u8, Feature>,
    #[serde(default)]
    pub stacks: BTreeMap<u16, Stack>,
}

impl From<&VendorList> for Declarations {
    fn from(list: &VendorList) -> Self {
        Self {
            gvl_specification_version: list.gvl_specification_version,
            vendor_list_version: list.vendor_list_version,
            tcf_policy_version: list.tcf_policy_version,
            last_updated: list.last_updated,
            purposes: list.purposes.clone(),
            special_purposes: list.special_purposes.clone(),
            features: list.features.clone(),
            special_features: list.special_features.clone(),
            stacks: list.stacks.clone(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purpose {
    pub id: u8,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description_legal: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: u8,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description_legal: String,
}

/// A predefined combination of purposes and special features shown as one choice.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub id: u16,
    #[serde(default)]
    pub purposes: Vec<u8>,
    #[serde(default)]
    pub special_features: Vec<u8>,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: u16,
    pub name: String,
    /// Purposes processed under consent.
    #[serde(default)]
    pub purposes: Vec<u8>,
    /// Purposes processed under legitimate interest.
    #[serde(default)]
    pub leg_int_purposes: Vec<u8>,
    /// Purposes whose legal basis a publisher restriction may switch.
    #[serde(default)]
    pub flexible_purposes: Vec<u8>,
    #[serde(default)]
    pub special_purposes: Vec<u8>,
    #[serde(default)]
    pub features: Vec<u8>,
    #[serde(default)]
    pub special_features: Vec<u8>,
    #[serde(default)]
    pub policy_url: String,
    /// Set once the vendor has withdrawn from the framework.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_date: Option<OffsetDateTime>,
}

impl Vendor {
    pub fn is_deleted(&self) -> bool {
        self.deleted_date.is_some()
    }
}
