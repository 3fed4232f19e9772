use bon::bon;
use log::{debug, error, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cleaning::error::CleanError;
use crate::types::payload::RawWeatherPayload;

/// Keys the `daily` section must carry before any tabulation happens.
pub const REQUIRED_DAILY_KEYS: [&str; 10] = [
    "time",
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

const NUMERIC_COLUMNS: [&str; 9] = [
    "Temp_Max_C",
    "Temp_Min_C",
    "Temp_Mean_C",
    "Precipitation_mm",
    "Rain_mm",
    "Snowfall_mm",
    "WindSpeed_Max_kph",
    "Radiation_Sum_kWh",
    "Sunshine_Minutes",
];

const LABEL_COLUMNS: [&str; 2] = ["City", "PostalCode"];

/// Output granularity of the cleaned table.
///
/// `Daily` keeps the provider's one-row-per-day shape. `Interval` resamples
/// onto a fixed sub-daily grid between the first and last timestamp,
/// re-interpolating the numeric columns across the new points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputGranularity {
    #[default]
    Daily,
    Interval {
        minutes: u32,
    },
}

/// The analysis-ready result of one cleaning pass.
#[derive(Debug)]
pub struct CleanedWeatherTable {
    pub frame: DataFrame,
    /// Rows removed by the plausibility filter; informational only.
    pub rows_dropped: usize,
}

impl CleanedWeatherTable {
    pub fn row_count(&self) -> usize {
        self.frame.height()
    }
}

/// Turns a raw provider payload into a [`CleanedWeatherTable`].
///
/// Steps, each a hard precondition for the next: schema check, tabulation,
/// timestamp normalization, plausibility filter, interpolation, label fill,
/// dedupe and sort, optional resample.
pub struct DataCleaner {
    default_granularity: OutputGranularity,
}

#[bon]
impl DataCleaner {
    pub fn new(default_granularity: OutputGranularity) -> Self {
        Self {
            default_granularity,
        }
    }

    /// Cleans one payload. `granularity` overrides the cleaner's default
    /// when set.
    #[builder]
    pub fn clean(
        &self,
        payload: &RawWeatherPayload,
        city: &str,
        postal: &str,
        granularity: Option<OutputGranularity>,
    ) -> Result<CleanedWeatherTable, CleanError> {
        let granularity = granularity.unwrap_or(self.default_granularity);
        let frame = build_frame(payload, city, postal)?;
        clean_frame(frame, granularity)
    }
}

/// Validates the `daily` section and builds the unprocessed table, one row
/// per index position across the parallel arrays, with constant `City` and
/// `PostalCode` columns.
fn build_frame(
    payload: &RawWeatherPayload,
    city: &str,
    postal: &str,
) -> Result<DataFrame, CleanError> {
    let daily = payload.daily().ok_or_else(|| {
        error!("missing 'daily' section in raw weather data");
        CleanError::MissingSection("daily".to_string())
    })?;

    let missing: Vec<String> = REQUIRED_DAILY_KEYS
        .iter()
        .filter(|key| !daily.contains_key(**key))
        .map(|key| (*key).to_string())
        .collect();
    if !missing.is_empty() {
        error!("missing keys in 'daily' section: {missing:?}");
        return Err(CleanError::MissingKeys {
            section: "daily".to_string(),
            missing,
        });
    }

    let frame = df!(
        "Date" => string_values(daily, "time")?,
        "Temp_Max_C" => numeric_values(daily, "temperature_2m_max")?,
        "Temp_Min_C" => numeric_values(daily, "temperature_2m_min")?,
        "Temp_Mean_C" => numeric_values(daily, "temperature_2m_mean")?,
        "Precipitation_mm" => numeric_values(daily, "precipitation_sum")?,
        "Rain_mm" => numeric_values(daily, "rain_sum")?,
        "Snowfall_mm" => numeric_values(daily, "snowfall_sum")?,
        "WindSpeed_Max_kph" => numeric_values(daily, "windspeed_10m_max")?,
        "Radiation_Sum_kWh" => numeric_values(daily, "shortwave_radiation_sum")?,
        "Sunshine_Minutes" => numeric_values(daily, "sunshine_duration")?,
    )
    .map_err(CleanError::Tabulation)?;

    let frame = frame
        .lazy()
        .with_columns([
            lit(city.to_string()).alias("City"),
            lit(postal.to_string()).alias("PostalCode"),
        ])
        .collect()
        .map_err(CleanError::Tabulation)?;

    info!("weather table constructed with {} rows", frame.height());
    Ok(frame)
}

fn clean_frame(
    frame: DataFrame,
    granularity: OutputGranularity,
) -> Result<CleanedWeatherTable, CleanError> {
    // Canonical timestamps; a malformed entry is a hard failure.
    let frame = frame
        .lazy()
        .with_column(col("Date").str().to_date(StrptimeOptions {
            format: Some("%Y-%m-%d".into()),
            ..Default::default()
        }))
        .collect()?;
    debug!("converted 'Date' column to date type");

    // Plausibility filter. Rows with nulls in the guarded columns fail the
    // predicate and are dropped with them.
    let before = frame.height();
    let frame = frame
        .lazy()
        .filter(
            col("Temp_Max_C")
                .lt_eq(lit(60.0))
                .and(col("Temp_Min_C").gt_eq(lit(-30.0)))
                .and(col("WindSpeed_Max_kph").lt(lit(200.0))),
        )
        .collect()?;
    let rows_dropped = before - frame.height();
    info!("removed {rows_dropped} rows with implausible sensor values");

    let frame = frame
        .lazy()
        .with_columns(numeric_cleanup_exprs())
        .with_columns(label_fill_exprs())
        .unique_stable(Some(vec!["Date".to_string().into()]), UniqueKeepStrategy::Last)
        .sort(["Date"], SortMultipleOptions::default())
        .collect()?;

    let frame = match granularity {
        OutputGranularity::Daily => frame,
        OutputGranularity::Interval { minutes } => resample_to_interval(frame, minutes)?,
    };

    if frame.height() == 0 {
        return Err(CleanError::EmptyTable);
    }
    info!("cleaned table ready, final row count: {}", frame.height());
    Ok(CleanedWeatherTable {
        frame,
        rows_dropped,
    })
}

/// Linear interpolation across interior gaps, rounded to one decimal.
/// Leading and trailing gaps are left as-is; interpolation never
/// extrapolates past the first or last valid value.
fn numeric_cleanup_exprs() -> Vec<Expr> {
    NUMERIC_COLUMNS
        .iter()
        .map(|name| col(*name).interpolate(InterpolationMethod::Linear).round(1))
        .collect()
}

fn label_fill_exprs() -> Vec<Expr> {
    LABEL_COLUMNS
        .iter()
        .map(|name| col(*name).forward_fill(None))
        .collect()
}

/// Resamples the cleaned daily table onto a fixed grid of `minutes`-spaced
/// timestamps between its first and last entry.
fn resample_to_interval(frame: DataFrame, minutes: u32) -> Result<DataFrame, CleanError> {
    let step_ms = i64::from(minutes.max(1)) * 60_000;

    let frame = frame
        .lazy()
        .with_column(col("Date").cast(DataType::Datetime(TimeUnit::Milliseconds, None)))
        .collect()?;

    let (first, last) = {
        let stamps = frame.column("Date")?.datetime()?;
        match (
            stamps.into_iter().flatten().min(),
            stamps.into_iter().flatten().max(),
        ) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(CleanError::EmptyTable),
        }
    };

    let grid: Vec<i64> = (first..=last).step_by(step_ms as usize).collect();
    let grid_column = Series::new("Date".into(), grid)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .into_column();
    let grid_frame = DataFrame::new(vec![grid_column])?;

    let resampled = grid_frame
        .lazy()
        .join(
            frame.lazy(),
            [col("Date")],
            [col("Date")],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns(numeric_cleanup_exprs())
        .with_columns(label_fill_exprs())
        .sort(["Date"], SortMultipleOptions::default())
        .collect()?;
    debug!(
        "resampled table onto a {minutes}-minute grid, {} rows",
        resampled.height()
    );
    Ok(resampled)
}

fn numeric_values(
    section: &Map<String, Value>,
    key: &str,
) -> Result<Vec<Option<f64>>, CleanError> {
    let items = section
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| CleanError::ColumnType {
            key: key.to_string(),
            expected: "numeric",
        })?;
    items
        .iter()
        .map(|value| match value {
            Value::Null => Ok(None),
            Value::Number(number) => Ok(number.as_f64()),
            _ => Err(CleanError::ColumnType {
                key: key.to_string(),
                expected: "numeric",
            }),
        })
        .collect()
}

fn string_values(
    section: &Map<String, Value>,
    key: &str,
) -> Result<Vec<Option<String>>, CleanError> {
    let items = section
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| CleanError::ColumnType {
            key: key.to_string(),
            expected: "string",
        })?;
    items
        .iter()
        .map(|value| match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            _ => Err(CleanError::ColumnType {
                key: key.to_string(),
                expected: "string",
            }),
        })
        .collect()
}
