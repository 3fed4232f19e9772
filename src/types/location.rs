use serde::{Deserialize, Serialize};

/// A resolved geographic location.
///
/// Exactly one resolver source produces this per pipeline run. `postal` and
/// the coordinates are mandatory for the downstream fetch; `city` is advisory
/// metadata that may be absent when the location came from static settings.
///
/// The cache file on disk holds this record serialized as JSON, so a cache
/// entry missing a required field fails at deserialization rather than deep
/// inside a later stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub postal: String,
    pub latitude: f64,
    pub longitude: f64,
}
