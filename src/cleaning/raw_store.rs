use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{error, info};

use crate::cleaning::error::CleanError;
use crate::types::payload::RawWeatherPayload;
use crate::weather_data::fetcher::RAW_FILE_PREFIX;

/// Picks the most recent raw weather artifact in `directory`.
///
/// "Most recent" means the newest creation time among files matching
/// `raw_weather_*.json` (modification time where the filesystem has no birth
/// time); identical stamps are tie-broken lexicographically on the filename
/// so the choice is deterministic within a run.
pub fn latest_raw_file(directory: &Path) -> Result<PathBuf, CleanError> {
    let entries = std::fs::read_dir(directory)
        .map_err(|e| CleanError::RawDirRead(directory.to_path_buf(), e))?;

    let mut candidates: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CleanError::RawDirRead(directory.to_path_buf(), e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(RAW_FILE_PREFIX) || !name.ends_with(".json") {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|e| CleanError::RawRead(entry.path(), e))?;
        let stamp = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map_err(|e| CleanError::RawRead(entry.path(), e))?;
        candidates.push((stamp, name, entry.path()));
    }

    let latest = candidates
        .into_iter()
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, _, path)| path)
        .ok_or_else(|| {
            error!("no raw weather files found in {}", directory.display());
            CleanError::NoRawFiles(directory.to_path_buf())
        })?;
    info!("latest raw file selected: {}", latest.display());
    Ok(latest)
}

pub async fn load_raw_payload(path: &Path) -> Result<RawWeatherPayload, CleanError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CleanError::RawRead(path.to_path_buf(), e))?;
    let payload = serde_json::from_slice(&bytes)
        .map_err(|e| CleanError::RawParse(path.to_path_buf(), e))?;
    info!("raw weather data loaded from {}", path.display());
    Ok(payload)
}
