use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use log::info;
use reqwest::Client;

use crate::retry::{get_with_retry, RetryPolicy};
use crate::types::location::LocationRecord;
use crate::types::payload::RawWeatherPayload;
use crate::utils;
use crate::weather_data::error::FetchError;

pub const ARCHIVE_API_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Filename prefix shared with the raw-file selection in the cleaning stage.
pub const RAW_FILE_PREFIX: &str = "raw_weather_";

/// Daily variables requested from the archive endpoint, in column order.
pub const DAILY_VARIABLES: [&str; 9] = [
    "temperature_2m_max",
    "temperature_2m_min",
    "temperature_2m_mean",
    "precipitation_sum",
    "rain_sum",
    "snowfall_sum",
    "windspeed_10m_max",
    "shortwave_radiation_sum",
    "sunshine_duration",
];

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
    pub days_to_pull: i64,
    pub timezone: Tz,
    pub raw_dir: PathBuf,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

/// Fetches historic daily weather from the Open-Meteo archive API and
/// persists each pull as a uniquely named raw artifact.
///
/// A thin transport wrapper: the decoded JSON body is returned unmodified,
/// and no schema validation happens here. That is the cleaning stage's
/// boundary.
pub struct WeatherFetcher {
    client: Client,
    config: FetcherConfig,
}

impl WeatherFetcher {
    pub fn new(client: Client, config: FetcherConfig) -> Self {
        Self { client, config }
    }

    /// The pull window: ends today in the configured timezone and starts
    /// `days_to_pull` days earlier.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let end = Utc::now().with_timezone(&self.config.timezone).date_naive();
        let start = end - chrono::Duration::days(self.config.days_to_pull);
        (start, end)
    }

    /// Issues the archive GET for the given coordinates and date range.
    pub async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<RawWeatherPayload, FetchError> {
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("start_date", start_date.to_string()),
            ("end_date", end_date.to_string()),
            ("daily", DAILY_VARIABLES.join(",")),
            ("timezone", self.config.timezone.name().to_string()),
        ];

        info!(
            "requesting weather data {start_date} to {end_date} for lat:{latitude}, lon:{longitude}"
        );
        let response = get_with_retry(
            &self.client,
            &self.config.base_url,
            &query,
            self.config.request_timeout,
            &self.config.retry,
        )
        .await?;

        let value = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FetchError::Decode {
                url: self.config.base_url.clone(),
                source: e,
            })?;
        info!("weather data fetched successfully");
        Ok(RawWeatherPayload::new(value))
    }

    /// Writes the payload under the raw-data directory as
    /// `raw_weather_<postal>_<timestamp>.json`, creating the directory if
    /// needed. The timestamp keeps every pull distinct so "latest raw file"
    /// stays well-defined.
    pub async fn store_raw(
        &self,
        payload: &RawWeatherPayload,
        postal: &str,
    ) -> Result<PathBuf, FetchError> {
        utils::ensure_dir_exists(&self.config.raw_dir)
            .await
            .map_err(|e| FetchError::RawDirCreation(self.config.raw_dir.clone(), e))?;

        let stamp = Utc::now()
            .with_timezone(&self.config.timezone)
            .format("%Y-%m-%d_%H-%M");
        let path = self
            .config
            .raw_dir
            .join(format!("{RAW_FILE_PREFIX}{postal}_{stamp}.json"));

        let bytes = serde_json::to_vec_pretty(payload.as_value()).map_err(FetchError::Serialize)?;
        utils::write_atomic(&path, bytes)
            .await
            .map_err(|e| FetchError::RawWrite(path.clone(), e))?;
        info!("raw weather payload saved to {}", path.display());
        Ok(path)
    }

    /// Fetches the configured window for a resolved location and stores the
    /// payload; returns the raw artifact path.
    pub async fn fetch_and_store(
        &self,
        location: &LocationRecord,
    ) -> Result<PathBuf, FetchError> {
        let (start_date, end_date) = self.date_range();
        let payload = self
            .fetch(location.latitude, location.longitude, start_date, end_date)
            .await?;
        self.store_raw(&payload, &location.postal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer, raw_dir: PathBuf) -> WeatherFetcher {
        WeatherFetcher::new(
            Client::new(),
            FetcherConfig {
                base_url: server.uri(),
                days_to_pull: 90,
                timezone: chrono_tz::Europe::Berlin,
                raw_dir,
                request_timeout: Duration::from_secs(5),
                retry: RetryPolicy {
                    max_attempts: 3,
                    initial_backoff: Duration::from_millis(5),
                },
            },
        )
    }

    fn sample_body() -> serde_json::Value {
        json!({
            "latitude": 52.52,
            "longitude": 13.405,
            "daily": {
                "time": ["2024-01-01", "2024-01-02"],
                "temperature_2m_max": [5.0, 6.0]
            }
        })
    }

    #[test]
    fn date_range_spans_days_to_pull() {
        let fetcher = WeatherFetcher::new(
            Client::new(),
            FetcherConfig {
                base_url: ARCHIVE_API_URL.to_string(),
                days_to_pull: 90,
                timezone: chrono_tz::Europe::Berlin,
                raw_dir: PathBuf::from("data/sources"),
                request_timeout: Duration::from_secs(15),
                retry: RetryPolicy::default(),
            },
        );
        let (start, end) = fetcher.date_range();
        assert_eq!(end - start, chrono::Duration::days(90));
    }

    #[tokio::test]
    async fn fetch_sends_expected_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("latitude", "52.52"))
            .and(query_param("longitude", "13.405"))
            .and(query_param("start_date", "2024-01-01"))
            .and(query_param("end_date", "2024-01-02"))
            .and(query_param("daily", DAILY_VARIABLES.join(",")))
            .and(query_param("timezone", "Europe/Berlin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_for(&server, dir.path().to_path_buf());
        let payload = fetcher
            .fetch(
                52.52,
                13.405,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            )
            .await
            .unwrap();
        assert!(payload.daily().is_some());
    }

    #[tokio::test]
    async fn fetch_recovers_from_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_for(&server, dir.path().to_path_buf());
        let payload = fetcher
            .fetch(
                52.52,
                13.405,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            )
            .await
            .unwrap();
        assert!(payload.daily().is_some());
    }

    #[tokio::test]
    async fn store_raw_writes_prefixed_artifact() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_for(&server, dir.path().join("sources"));
        let payload = RawWeatherPayload::new(sample_body());

        let path = fetcher.store_raw(&payload, "10115").await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("raw_weather_10115_"));
        assert!(name.ends_with(".json"));

        let written: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(written, sample_body());
    }
}
