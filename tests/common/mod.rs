use assert_json_diff::assert_json_eq;
use iab_tcf::{TCModel, TCString};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    tc_string: String,
    expected_model: Value,
    #[serde(default)]
    re_encodes: bool,
}

impl TestCase {
    pub fn load_from_file<P: AsRef<Path>>(p: P) -> io::Result<Self> {
        let f = File::open(p)?;
        let tc: Self = serde_json::from_reader(&f)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()))?;
        Ok(tc)
    }

    pub fn assert_json_matches(&self) {
        let model = TCString::parse_str(&self.tc_string)
            .and_then(|s| s.decode())
            .unwrap_or_else(|e| panic!("decode error: {e}"));

        assert_json_eq!(serde_json::to_value(&model).unwrap(), self.expected_model);

        if self.re_encodes {
            assert_eq!(TCString::encode(&model).unwrap().to_string(), self.tc_string);
        }
    }
}

#[allow(dead_code)]
pub fn load_gvl() -> Arc<iab_tcf::Gvl> {
    let json = std::fs::read_to_string("tests/data/vendor-list.json").expect("missing vendor list");
    Arc::new(json.parse().expect("invalid vendor list"))
}

#[allow(dead_code)]
pub fn decode(s: &str) -> TCModel {
    s.parse().unwrap_or_else(|e| panic!("decode error for {s}: {e}"))
}
