use crate::cleaning::error::CleanError;
use crate::location::error::LocationError;
use crate::pipeline::PipelineStage;
use crate::weather_data::error::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error("invalid timezone '{0}' in settings")]
    InvalidTimezone(String),

    #[error("failed to determine data directory")]
    DataDirResolution,
}

impl EtlError {
    /// The pipeline stage this error aborts, when it maps to one.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            EtlError::Location(_) => Some(PipelineStage::ResolveLocation),
            EtlError::Fetch(_) => Some(PipelineStage::FetchWeather),
            EtlError::Clean(_) => Some(PipelineStage::CleanData),
            EtlError::InvalidTimezone(_) | EtlError::DataDirResolution => None,
        }
    }
}
