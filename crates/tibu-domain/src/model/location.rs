use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Where a transaction took place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub label: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    /// ISO 3166-1 alpha-2.
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub website_url: Option<Url>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl LocationInfo {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}
