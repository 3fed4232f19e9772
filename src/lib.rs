mod cleaning;
mod error;
mod location;
mod pipeline;
mod retry;
mod settings;
mod types;
mod utils;
mod weather_data;

pub use error::EtlError;
pub use pipeline::{PipelineStage, RunSummary, WeatherEtl};

pub use cleaning::cleaner::{
    CleanedWeatherTable, DataCleaner, OutputGranularity, REQUIRED_DAILY_KEYS,
};
pub use cleaning::error::CleanError;
pub use cleaning::raw_store::{latest_raw_file, load_raw_payload};
pub use cleaning::writer::{CleanedStore, SavedArtifacts};

pub use location::error::LocationError;
pub use location::ip::{IpLookup, IpLookupConfig, DEFAULT_IP_ENDPOINT};
pub use location::resolver::LocationResolver;

pub use retry::{get_with_retry, RetryPolicy, TransportError, RETRYABLE_STATUSES};
pub use settings::{DataPaths, Endpoints, FixedLocation, Settings};

pub use types::location::LocationRecord;
pub use types::payload::RawWeatherPayload;

pub use weather_data::error::FetchError;
pub use weather_data::fetcher::{
    FetcherConfig, WeatherFetcher, ARCHIVE_API_URL, DAILY_VARIABLES, RAW_FILE_PREFIX,
};
