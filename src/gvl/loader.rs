//! Loading of published vendor lists through a caller-supplied transport.
use crate::gvl::{Declarations, Gvl, GvlError, VendorList};
use crate::model::is_consent_language;
use fnv::FnvHashMap;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, trace};

/// Boxed error returned by a [`Fetch`] implementation.
pub type FetchError = Box<dyn Error + Send + Sync>;

const DISALLOWED_HOST: &str = "vendorlist.consensu.org/";
const VERSION_PLACEHOLDER: &str = "[VERSION]";
const LANGUAGE_PLACEHOLDER: &str = "[LANG]";

/// The single capability the loader needs from its environment: retrieving a JSON
/// document by URL. Headers, retries and timeouts are left to the implementation.
pub trait Fetch {
    fn fetch_json(&self, url: &str) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// Locations of the vendor list documents.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct GvlLoaderConfig {
    /// Location the documents are hosted at. It cannot be the canonical host.
    pub base_url: String,
    /// Document holding the latest vendor list.
    pub latest_filename: String,
    /// Document holding a given version, `[VERSION]` being replaced by the version number.
    pub versioned_filename: String,
    /// Document holding translated declarations, `[LANG]` being replaced by the
    /// lowercase language code.
    pub language_filename: String,
}

impl Default for GvlLoaderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            latest_filename: "vendor-list.json".to_string(),
            versioned_filename: "archives/vendor-list-v[VERSION].json".to_string(),
            language_filename: "purposes-[LANG].json".to_string(),
        }
    }
}

impl GvlLoaderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

fn validate_base_url(url: &str) -> Result<String, GvlError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(GvlError::MissingBaseUrl);
    }

    let mut url = url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }

    let lower = url.to_ascii_lowercase();
    let host = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    if host.is_some_and(|h| h.starts_with(DISALLOWED_HOST)) {
        return Err(GvlError::DisallowedBaseUrl(url));
    }

    Ok(url)
}

/// Vendor lists and declarations already retrieved.
///
/// Entries are only ever added: once a version, a language or the latest list is
/// cached, it is never replaced or evicted. A cache can be shared between loaders.
#[derive(Debug, Default)]
pub struct GvlCache {
    languages: RwLock<FnvHashMap<String, Declarations>>,
    versions: RwLock<FnvHashMap<u16, VendorList>>,
    latest: RwLock<Option<VendorList>>,
}

impl GvlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, version: u16) -> Option<VendorList> {
        let versions = self.versions.read().unwrap_or_else(PoisonError::into_inner);
        versions.get(&version).cloned()
    }

    pub fn latest(&self) -> Option<VendorList> {
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        latest.clone()
    }

    pub fn language(&self, lang: &str) -> Option<Declarations> {
        let languages = self.languages.read().unwrap_or_else(PoisonError::into_inner);
        languages.get(&lang.to_ascii_uppercase()).cloned()
    }

    fn insert_version(&self, list: &VendorList) {
        let mut versions = self.versions.write().unwrap_or_else(PoisonError::into_inner);
        versions
            .entry(list.vendor_list_version)
            .or_insert_with(|| list.clone());
    }

    fn insert_latest(&self, list: &VendorList) {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        if latest.is_none() {
            *latest = Some(list.clone());
        }
    }

    fn insert_language(&self, lang: &str, declarations: Declarations) {
        let mut languages = self.languages.write().unwrap_or_else(PoisonError::into_inner);
        languages
            .entry(lang.to_ascii_uppercase())
            .or_insert(declarations);
    }
}

/// Builds [`Gvl`] instances from published documents, going through a cache first.
pub struct GvlLoader<F> {
    config: GvlLoaderConfig,
    fetcher: F,
    cache: Arc<GvlCache>,
}

impl<F> GvlLoader<F>
where
    F: Fetch,
{
    /// Creates a loader with its own cache.
    ///
    /// Fails when the base URL is missing or points at the canonical host.
    pub fn new(config: GvlLoaderConfig, fetcher: F) -> Result<Self, GvlError> {
        let base_url = validate_base_url(&config.base_url)?;
        Ok(Self {
            config: GvlLoaderConfig { base_url, ..config },
            fetcher,
            cache: Arc::new(GvlCache::new()),
        })
    }

    /// Replaces the loader's cache with a shared one.
    pub fn with_cache(self, cache: Arc<GvlCache>) -> Self {
        Self { cache, ..self }
    }

    pub fn cache(&self) -> &Arc<GvlCache> {
        &self.cache
    }

    pub fn config(&self) -> &GvlLoaderConfig {
        &self.config
    }

    /// Loads a given version of the vendor list, or the latest one when `version`
    /// is `None` or zero.
    pub async fn load(&self, version: Option<u16>) -> Result<Gvl, GvlError> {
        match version {
            Some(v) if v > 0 => self.load_version(v).await,
            _ => self.load_latest().await,
        }
    }

    pub async fn load_latest(&self) -> Result<Gvl, GvlError> {
        if let Some(list) = self.cache.latest() {
            debug!(version = list.vendor_list_version, "latest vendor list cache hit");
            return Ok(Gvl::new(list));
        }

        let url = format!("{}{}", self.config.base_url, self.config.latest_filename);
        let list: VendorList = serde_json::from_value(self.fetch(&url).await?)?;
        self.cache.insert_latest(&list);
        Ok(self.populate(list))
    }

    pub async fn load_version(&self, version: u16) -> Result<Gvl, GvlError> {
        if let Some(list) = self.cache.version(version) {
            debug!(version, "vendor list cache hit");
            return Ok(Gvl::new(list));
        }

        let filename = self
            .config
            .versioned_filename
            .replace(VERSION_PLACEHOLDER, &version.to_string());
        let url = format!("{}{}", self.config.base_url, filename);
        let list = serde_json::from_value(self.fetch(&url).await?)?;
        Ok(self.populate(list))
    }

    /// Builds a vendor list from memory, caching it as if it had been fetched.
    pub fn from_vendor_list(&self, list: VendorList) -> Gvl {
        self.populate(list)
    }

    /// Switches the texts of purposes, features and stacks to another language.
    pub async fn change_language(&self, gvl: &mut Gvl, lang: &str) -> Result<(), GvlError> {
        let lang = lang.to_ascii_uppercase();
        if !is_consent_language(&lang) {
            return Err(GvlError::UnsupportedLanguage(lang));
        }
        if gvl.language() == lang {
            return Ok(());
        }

        // remember the current texts so switching back needs no fetch
        self.cache.insert_language(gvl.language(), gvl.declarations());

        let declarations = match self.cache.language(&lang) {
            Some(declarations) => {
                debug!(%lang, "declarations cache hit");
                declarations
            }
            None => {
                let filename = self
                    .config
                    .language_filename
                    .replace(LANGUAGE_PLACEHOLDER, &lang.to_ascii_lowercase());
                let url = format!("{}{}", self.config.base_url, filename);
                let declarations: Declarations = serde_json::from_value(self.fetch(&url).await?)?;
                self.cache.insert_language(&lang, declarations.clone());
                declarations
            }
        };

        gvl.set_declarations(&lang, declarations);
        info!(%lang, "changed vendor list language");
        Ok(())
    }

    fn populate(&self, list: VendorList) -> Gvl {
        self.cache.insert_version(&list);
        let gvl = Gvl::new(list);
        self.cache.insert_language(gvl.language(), gvl.declarations());
        gvl
    }

    async fn fetch(&self, url: &str) -> Result<Value, GvlError> {
        trace!(url, "fetching");
        let value = self
            .fetcher
            .fetch_json(url)
            .await
            .map_err(|source| GvlError::Fetch {
                url: url.to_string(),
                source,
            })?;
        debug!(url, "fetched vendor list document");
        Ok(value)
    }
}

/// A [`Fetch`] implementation backed by a `reqwest` client.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "reqwest")]
impl Fetch for ReqwestFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let value: Value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }
}
