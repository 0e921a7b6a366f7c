//! CSV ingestion for hourly traffic observations
//!
//! Rows are type-checked at the boundary. A row with a missing or malformed
//! field is quarantined with a reason rather than coerced.

use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::features::temporal::parse_timestamp;
use crate::{Observation, RawRecord, Result, TrafficError};

/// Columns that must be present in the header
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "holiday",
    "temp",
    "rain_1h",
    "snow_1h",
    "clouds_all",
    "weather_main",
    "date_time",
    "traffic_volume",
];

/// Holiday value used for regular days
pub const NO_HOLIDAY: &str = "None";

#[derive(Debug, Deserialize)]
struct CsvRow {
    holiday: String,
    temp: f64,
    rain_1h: f64,
    snow_1h: f64,
    clouds_all: f64,
    weather_main: String,
    date_time: String,
    traffic_volume: u32,
}

/// A row that failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// 1-based line number in the source file
    pub line: u64,
    pub reason: String,
}

/// Result of reading an input file
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub observations: Vec<Observation>,
    pub rejected: Vec<RejectedRow>,
}

impl LoadReport {
    pub fn total_rows(&self) -> usize {
        self.observations.len() + self.rejected.len()
    }
}

/// Load observations from a CSV file
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<LoadReport> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        TrafficError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;
    let report = load_from_reader(file)?;
    log::info!(
        "Loaded {} observations from {} ({} rejected)",
        report.observations.len(),
        path.display(),
        report.rejected.len()
    );
    Ok(report)
}

/// Load observations from any CSV source with a header row
pub fn load_from_reader<R: Read>(reader: R) -> Result<LoadReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(TrafficError::Parse(format!(
            "input is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut report = LoadReport::default();
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                reject(&mut report, line, e.to_string());
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line());

        let row: CsvRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                reject(&mut report, line, e.to_string());
                continue;
            }
        };

        match validate(row) {
            Ok(observation) => report.observations.push(observation),
            Err(reason) => reject(&mut report, line, reason),
        }
    }

    if !report.rejected.is_empty() {
        log::warn!(
            "Quarantined {} of {} rows",
            report.rejected.len(),
            report.total_rows()
        );
    }
    Ok(report)
}

fn reject(report: &mut LoadReport, line: u64, reason: String) {
    log::debug!("Rejected line {}: {}", line, reason);
    report.rejected.push(RejectedRow { line, reason });
}

/// Checks serde cannot express: finite numbers, parseable timestamp,
/// non-empty weather category
fn validate(row: CsvRow) -> std::result::Result<Observation, String> {
    for (name, value) in [
        ("temp", row.temp),
        ("rain_1h", row.rain_1h),
        ("snow_1h", row.snow_1h),
        ("clouds_all", row.clouds_all),
    ] {
        if !value.is_finite() {
            return Err(format!("{} is not a finite number", name));
        }
    }

    if parse_timestamp(&row.date_time).is_err() {
        return Err(format!("unparseable date_time {:?}", row.date_time));
    }

    if row.weather_main.is_empty() {
        return Err("weather_main is empty".to_string());
    }

    let holiday = if row.holiday.is_empty() {
        NO_HOLIDAY.to_string()
    } else {
        row.holiday
    };

    Ok(Observation {
        record: RawRecord {
            date_time: row.date_time,
            holiday,
            temp: row.temp,
            rain_1h: row.rain_1h,
            snow_1h: row.snow_1h,
            clouds_all: row.clouds_all,
            weather_main: row.weather_main,
        },
        traffic_volume: row.traffic_volume,
    })
}
