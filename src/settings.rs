use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::cleaning::cleaner::OutputGranularity;
use crate::error::EtlError;
use crate::location::ip::DEFAULT_IP_ENDPOINT;
use crate::types::location::LocationRecord;
use crate::weather_data::fetcher::ARCHIVE_API_URL;

const DATA_DIR_NAME: &str = "weather_etl";

/// Externally supplied pipeline configuration.
///
/// Passed by value into [`crate::WeatherEtl::new`]; nothing in the crate
/// reads ambient process state. All fields have serde defaults so a host
/// application can deserialize a partial document from whatever format it
/// keeps its configuration in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fixed location, consulted as the first resolver tier.
    pub location: Option<FixedLocation>,
    /// Length of the pull window in days, ending today.
    pub days_to_pull: i64,
    /// IANA timezone name used for the API request and artifact timestamps.
    pub timezone: String,
    pub paths: DataPaths,
    pub endpoints: Endpoints,
    /// Also write a parquet twin of the cleaned CSV.
    pub write_parquet: bool,
    pub granularity: OutputGranularity,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            location: None,
            days_to_pull: 90,
            timezone: "Europe/Berlin".to_string(),
            paths: DataPaths::default(),
            endpoints: Endpoints::default(),
            write_parquet: false,
            granularity: OutputGranularity::Daily,
        }
    }
}

impl Settings {
    pub fn timezone(&self) -> Result<Tz, EtlError> {
        self.timezone
            .parse()
            .map_err(|_| EtlError::InvalidTimezone(self.timezone.clone()))
    }
}

/// Optional fixed location from settings. Resolution uses it only when
/// postal and both coordinates are present; `city` is passed through when
/// configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedLocation {
    pub city: Option<String>,
    pub postal: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl FixedLocation {
    pub fn as_record(&self) -> Option<LocationRecord> {
        match (&self.postal, self.latitude, self.longitude) {
            (Some(postal), Some(latitude), Some(longitude)) => Some(LocationRecord {
                city: self.city.clone(),
                postal: postal.clone(),
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Location cache file, written by IP-based resolution.
    pub location_cache: PathBuf,
    /// Raw weather payloads, one file per fetch.
    pub raw_dir: PathBuf,
    /// Cleaned artifacts.
    pub staging_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            location_cache: PathBuf::from("data/sources/location.json"),
            raw_dir: PathBuf::from("data/sources"),
            staging_dir: PathBuf::from("data/staging"),
        }
    }
}

impl DataPaths {
    /// The default layout rooted under `base` instead of the working
    /// directory.
    pub fn under(base: &Path) -> Self {
        Self {
            location_cache: base.join("sources").join("location.json"),
            raw_dir: base.join("sources"),
            staging_dir: base.join("staging"),
        }
    }

    /// The default layout under the platform's local data directory.
    pub fn system() -> Result<Self, EtlError> {
        let base = dirs::data_local_dir().ok_or(EtlError::DataDirResolution)?;
        Ok(Self::under(&base.join(DATA_DIR_NAME)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub weather_api: String,
    pub ip_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            weather_api: ARCHIVE_API_URL.to_string(),
            ip_api: DEFAULT_IP_ENDPOINT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.days_to_pull, 90);
        assert_eq!(settings.timezone, "Europe/Berlin");
        assert!(!settings.write_parquet);
        assert_eq!(settings.granularity, OutputGranularity::Daily);
        assert_eq!(settings.endpoints.weather_api, ARCHIVE_API_URL);
    }

    #[test]
    fn partial_document_deserializes_with_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"days_to_pull": 7}"#).unwrap();
        assert_eq!(settings.days_to_pull, 7);
        assert_eq!(settings.timezone, "Europe/Berlin");
    }

    #[test]
    fn invalid_timezone_is_rejected() {
        let settings = Settings {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.timezone(),
            Err(EtlError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn system_paths_share_the_sources_directory() {
        // Skipped silently on platforms without a data directory.
        if let Ok(paths) = DataPaths::system() {
            assert_eq!(paths.location_cache.parent(), Some(paths.raw_dir.as_path()));
            assert!(paths.raw_dir.ends_with("weather_etl/sources"));
        }
    }

    #[test]
    fn fixed_location_needs_postal_and_both_coordinates() {
        let complete = FixedLocation {
            city: None,
            postal: Some("10115".to_string()),
            latitude: Some(52.52),
            longitude: Some(13.405),
        };
        assert!(complete.as_record().is_some());

        let incomplete = FixedLocation {
            postal: Some("10115".to_string()),
            latitude: Some(52.52),
            ..FixedLocation::default()
        };
        assert!(incomplete.as_record().is_none());
    }
}
