//! This crate is an implementation of the IAB Transparency and Consent Framework (TCF)
//! [consent string format](https://github.com/InteractiveAdvertisingBureau/GDPR-Transparency-and-Consent-Framework).
//!
//! It decodes and encodes version 1 and version 2 TC strings, and provides a model of the
//! Global Vendor List (GVL) which is needed to validate consent data against vendor declarations.
//!
//! NOTE: This is not an official IAB library.
//!
//! # Decoding TC strings
//!
//! A TC string is made of a mandatory core segment and a list of optional segments.
//!
//! The [`TCString`] type splits a string into its segments, which are then decoded into
//! a [`TCModel`].
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use iab_tcf::{TCModel, TCString};
//!
//! let s = "CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA.ZAAgH9794ulA";
//! let tc_string = TCString::parse_str(s)?;
//!
//! for (segment, raw) in tc_string.segments() {
//!     println!("{segment}: {raw}");
//! }
//!
//! let model = tc_string.decode()?;
//! assert_eq!(model.publisher_country_code(), "DE");
//!
//! // A model can be obtained directly from a string as well:
//! let model: TCModel = s.parse()?;
//! assert!(model.publisher_consents.has(3));
//! # Ok(())
//! # }
//! ```
//!
//! # Checking consent
//!
//! The following example checks that a vendor (id 8) may store and access information
//! on the device of the user (purpose 1).
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use iab_tcf::TCModel;
//!
//! let model: TCModel = "COvFyGBOvFyGBAbAAAENAPCAAOAAAAAAAAAAAEEUACCKAAA".parse()?;
//!
//! let has_user_consent = model.purpose_consents.has(1) && model.vendor_consents.has(8);
//! assert!(has_user_consent);
//! # Ok(())
//! # }
//! ```
//!
//! # Encoding
//!
//! Models are encoded with [`TCString::encode`]. A vendor list can be attached to a model
//! with [`TCModel::set_gvl`], which enables bulk operations over the listed vendors and
//! drops publisher restrictions that vendors do not allow.
//!
//! # Error handling
//!
//! This crate is conservative with regard to how it handles parsing failure. If a string cannot be
//! fully decoded, then it is considered as an error.
//!
//! This is done to avoid obtaining erroneous user consent information from potentially corrupted
//! payloads.
//!
pub(crate) mod core;
pub mod encoder;
pub mod error;
pub mod gvl;
pub mod model;
pub mod tc_model;
pub mod tc_string;

pub use error::{DecodingError, EncodingError};
pub use gvl::Gvl;
pub use tc_model::TCModel;
pub use tc_string::{EncodeOptions, TCString};
