use std::path::PathBuf;

use crate::retry::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error(transparent)]
    IpTransport(#[from] TransportError),

    #[error("failed to decode IP geolocation response")]
    IpDecode(#[source] reqwest::Error),

    #[error("IP geolocation response is missing fields: {}", missing.join(", "))]
    IpIncomplete { missing: Vec<&'static str> },

    #[error("could not parse coordinate string '{loc}' as 'lat,lon'")]
    CoordinateParse { loc: String },

    #[error("failed to read location cache '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("invalid location cache '{0}'")]
    CacheParse(PathBuf, #[source] serde_json::Error),

    #[error("failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("failed to write location cache '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("failed to serialize location record")]
    CacheSerialize(#[source] serde_json::Error),

    #[error("all location sources exhausted: settings, cache file, IP lookup")]
    SourcesExhausted(#[source] Box<LocationError>),
}
