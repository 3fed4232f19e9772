use std::path::PathBuf;

use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("no raw weather files found in '{0}'")]
    NoRawFiles(PathBuf),

    #[error("failed to read raw data directory '{0}'")]
    RawDirRead(PathBuf, #[source] std::io::Error),

    #[error("failed to read raw weather file '{0}'")]
    RawRead(PathBuf, #[source] std::io::Error),

    #[error("invalid JSON in raw weather file '{0}'")]
    RawParse(PathBuf, #[source] serde_json::Error),

    #[error("raw payload has no '{0}' section")]
    MissingSection(String),

    #[error("missing keys in '{section}' section: {}", missing.join(", "))]
    MissingKeys {
        section: String,
        missing: Vec<String>,
    },

    #[error("'{key}' in the daily section is not a {expected} array")]
    ColumnType { key: String, expected: &'static str },

    #[error("location metadata has no city name")]
    MissingCity,

    #[error("cleaned table has no rows")]
    EmptyTable,

    #[error("failed to build weather table")]
    Tabulation(#[source] PolarsError),

    #[error("failed processing weather table")]
    Processing(#[from] PolarsError),

    #[error("failed to create staging directory '{0}'")]
    StagingDirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing csv file '{0}'")]
    CsvWriteIo(PathBuf, #[source] std::io::Error),

    #[error("encoding error writing csv file '{0}'")]
    CsvWritePolars(PathBuf, #[source] PolarsError),

    #[error("I/O error writing parquet file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("encoding error writing parquet file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
