mod common;

use iab_tcf::gvl::loader::FetchError;
use iab_tcf::gvl::{Fetch, GvlError, GvlLoader, GvlLoaderConfig};
use serde_json::Value;
use std::sync::Mutex;

#[derive(Default)]
struct RecordingFetcher {
    requests: Mutex<Vec<String>>,
}

impl Fetch for &RecordingFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let json = std::fs::read_to_string("tests/data/vendor-list.json")?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[test]
fn narrowing_keeps_full_vendor_list() {
    let mut gvl = (*common::load_gvl()).clone();
    gvl.narrow_vendors_to([1, 2]);

    assert_eq!(gvl.vendors().keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(gvl.vendors_with_consent_purpose(1).len(), 2);

    let json = gvl.get_json().unwrap();
    let full = json["vendors"].as_object().unwrap();
    assert_eq!(full.len(), 8);
    assert!(full.contains_key("11"));

    gvl.narrow_vendors_to(gvl.full_vendor_list().keys().copied().collect::<Vec<_>>());
    assert_eq!(gvl.vendors().len(), 7);
}

#[tokio::test]
async fn disallowed_base_url_fails_before_fetch() {
    let fetcher = RecordingFetcher::default();

    let result = GvlLoader::new(
        GvlLoaderConfig::new("https://vendorlist.consensu.org/v2/"),
        &fetcher,
    );
    assert!(matches!(result, Err(GvlError::DisallowedBaseUrl(_))));
    assert!(fetcher.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn loaded_list_is_shared_through_cache() {
    let fetcher = RecordingFetcher::default();
    let loader = GvlLoader::new(GvlLoaderConfig::new("https://cmp.example"), &fetcher).unwrap();

    let latest = loader.load(None).await.unwrap();
    let other = GvlLoader::new(GvlLoaderConfig::new("https://cmp.example"), &fetcher)
        .unwrap()
        .with_cache(loader.cache().clone());
    let version = other.load(Some(latest.vendor_list_version())).await.unwrap();

    assert_eq!(latest, version);
    assert_eq!(
        *fetcher.requests.lock().unwrap(),
        vec!["https://cmp.example/vendor-list.json".to_string()]
    );
}
