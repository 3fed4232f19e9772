use std::path::PathBuf;

use crate::retry::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode weather response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to create raw data directory '{0}'")]
    RawDirCreation(PathBuf, #[source] std::io::Error),

    #[error("failed to serialize raw weather payload")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write raw weather file '{0}'")]
    RawWrite(PathBuf, #[source] std::io::Error),
}
