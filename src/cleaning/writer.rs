use std::path::{Path, PathBuf};

use chrono::Utc;
use chrono_tz::Tz;
use log::info;
use polars::prelude::*;
use tokio::task;

use crate::cleaning::cleaner::CleanedWeatherTable;
use crate::cleaning::error::CleanError;
use crate::utils;

/// Paths produced by one [`CleanedStore::save`] call.
pub struct SavedArtifacts {
    pub csv_path: PathBuf,
    pub parquet_path: Option<PathBuf>,
}

/// Writes cleaned tables into the staging directory, one timestamped CSV per
/// run and optionally a parquet twin.
///
/// Writes go through a temp file in the target directory plus an atomic
/// rename, so a failed write never leaves a partial artifact.
pub struct CleanedStore {
    staging_dir: PathBuf,
    timezone: Tz,
    write_parquet: bool,
}

impl CleanedStore {
    pub fn new(staging_dir: PathBuf, timezone: Tz, write_parquet: bool) -> Self {
        Self {
            staging_dir,
            timezone,
            write_parquet,
        }
    }

    pub async fn save(&self, table: &CleanedWeatherTable) -> Result<SavedArtifacts, CleanError> {
        utils::ensure_dir_exists(&self.staging_dir)
            .await
            .map_err(|e| CleanError::StagingDirCreation(self.staging_dir.clone(), e))?;

        let stamp = Utc::now()
            .with_timezone(&self.timezone)
            .format("%Y%m%d_%H%M%S");
        let csv_path = self
            .staging_dir
            .join(format!("cleaned_weather_{stamp}.csv"));
        write_csv(table.frame.clone(), csv_path.clone()).await?;
        info!("cleaned weather table written to {}", csv_path.display());

        let parquet_path = if self.write_parquet {
            let path = self
                .staging_dir
                .join(format!("cleaned_weather_{stamp}.parquet"));
            write_parquet(table.frame.clone(), path.clone()).await?;
            info!("cleaned weather table written to {}", path.display());
            Some(path)
        } else {
            None
        };

        Ok(SavedArtifacts {
            csv_path,
            parquet_path,
        })
    }
}

async fn write_csv(mut frame: DataFrame, path: PathBuf) -> Result<(), CleanError> {
    task::spawn_blocking(move || {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| CleanError::CsvWriteIo(path.clone(), e))?;
        CsvWriter::new(tmp.as_file_mut())
            .include_header(true)
            .finish(&mut frame)
            .map_err(|e| CleanError::CsvWritePolars(path.clone(), e))?;
        tmp.persist(&path)
            .map_err(|e| CleanError::CsvWriteIo(path.clone(), e.error))?;
        Ok::<(), CleanError>(())
    })
    .await??;
    Ok(())
}

async fn write_parquet(mut frame: DataFrame, path: PathBuf) -> Result<(), CleanError> {
    task::spawn_blocking(move || {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| CleanError::ParquetWriteIo(path.clone(), e))?;
        ParquetWriter::new(tmp.as_file_mut())
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut frame)
            .map_err(|e| CleanError::ParquetWritePolars(path.clone(), e))?;
        tmp.persist(&path)
            .map_err(|e| CleanError::ParquetWriteIo(path.clone(), e.error))?;
        Ok::<(), CleanError>(())
    })
    .await??;
    Ok(())
}
