//! The pipeline orchestrator: resolve a location, fetch the raw weather
//! window, clean it into a tabular artifact. Stages run strictly in
//! sequence and the first failure aborts the run with the failing stage
//! recorded; artifacts already written by earlier stages are left in place.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use log::{error, info};
use reqwest::Client;

use crate::cleaning::cleaner::{CleanedWeatherTable, DataCleaner};
use crate::cleaning::error::CleanError;
use crate::cleaning::raw_store::{latest_raw_file, load_raw_payload};
use crate::cleaning::writer::{CleanedStore, SavedArtifacts};
use crate::error::EtlError;
use crate::location::ip::{IpLookup, IpLookupConfig};
use crate::location::resolver::LocationResolver;
use crate::retry::RetryPolicy;
use crate::settings::Settings;
use crate::types::location::LocationRecord;
use crate::weather_data::fetcher::{FetcherConfig, WeatherFetcher};

const WEATHER_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    ResolveLocation,
    FetchWeather,
    CleanData,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::ResolveLocation => "RESOLVE_LOCATION",
            PipelineStage::FetchWeather => "FETCH_WEATHER",
            PipelineStage::CleanData => "CLEAN_DATA",
        };
        f.write_str(name)
    }
}

/// What one successful run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub location: LocationRecord,
    pub raw_path: PathBuf,
    pub csv_path: PathBuf,
    pub parquet_path: Option<PathBuf>,
    pub rows: usize,
    pub rows_dropped: usize,
}

/// One-shot batch pipeline over a single location and date range.
pub struct WeatherEtl {
    raw_dir: PathBuf,
    resolver: LocationResolver,
    fetcher: WeatherFetcher,
    cleaner: DataCleaner,
    store: CleanedStore,
}

impl WeatherEtl {
    pub fn new(settings: Settings) -> Result<Self, EtlError> {
        let timezone: Tz = settings.timezone()?;
        let client = Client::new();
        let retry = RetryPolicy::default();

        let resolver = LocationResolver::new(
            settings.location.clone(),
            settings.paths.location_cache.clone(),
            IpLookup::new(
                client.clone(),
                IpLookupConfig {
                    endpoint: settings.endpoints.ip_api.clone(),
                    retry: retry.clone(),
                    ..IpLookupConfig::default()
                },
            ),
        );
        let fetcher = WeatherFetcher::new(
            client,
            FetcherConfig {
                base_url: settings.endpoints.weather_api.clone(),
                days_to_pull: settings.days_to_pull,
                timezone,
                raw_dir: settings.paths.raw_dir.clone(),
                request_timeout: WEATHER_REQUEST_TIMEOUT,
                retry,
            },
        );
        let cleaner = DataCleaner::new(settings.granularity);
        let store = CleanedStore::new(
            settings.paths.staging_dir.clone(),
            timezone,
            settings.write_parquet,
        );

        Ok(Self {
            raw_dir: settings.paths.raw_dir,
            resolver,
            fetcher,
            cleaner,
            store,
        })
    }

    /// Runs the three stages to completion, aborting on the first failure.
    pub async fn run(&self) -> Result<RunSummary, EtlError> {
        info!("starting weather pipeline");

        let location = match self.resolver.resolve().await {
            Ok(location) => location,
            Err(e) => return Err(abort(PipelineStage::ResolveLocation, e.into())),
        };
        info!(
            "location resolved: {} ({})",
            location.postal,
            location.city.as_deref().unwrap_or("unknown city")
        );

        let raw_path = match self.fetcher.fetch_and_store(&location).await {
            Ok(path) => path,
            Err(e) => return Err(abort(PipelineStage::FetchWeather, e.into())),
        };
        info!("weather data fetched and stored");

        let (table, artifacts) = match self.clean_latest(&location).await {
            Ok(result) => result,
            Err(e) => return Err(abort(PipelineStage::CleanData, e.into())),
        };
        info!("pipeline finished: {} cleaned rows", table.row_count());

        Ok(RunSummary {
            location,
            raw_path,
            csv_path: artifacts.csv_path,
            parquet_path: artifacts.parquet_path,
            rows: table.row_count(),
            rows_dropped: table.rows_dropped,
        })
    }

    /// The clean stage: select the most recent raw artifact from disk (the
    /// filesystem is the stage boundary), clean it with the resolved
    /// location's labels, and persist the result.
    async fn clean_latest(
        &self,
        location: &LocationRecord,
    ) -> Result<(CleanedWeatherTable, SavedArtifacts), CleanError> {
        let raw_file = latest_raw_file(&self.raw_dir)?;
        let payload = load_raw_payload(&raw_file).await?;
        let city = location.city.as_deref().ok_or(CleanError::MissingCity)?;
        let table = self
            .cleaner
            .clean()
            .payload(&payload)
            .city(city)
            .postal(&location.postal)
            .call()?;
        let artifacts = self.store.save(&table).await?;
        Ok((table, artifacts))
    }
}

fn abort(stage: PipelineStage, e: EtlError) -> EtlError {
    error!("pipeline aborted at {stage}: {e}");
    e
}
