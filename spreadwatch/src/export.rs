//! Flat tabular export of the history ledger and daily rollups.
//!
//! One row per entity, snake_case headers, CSV via serde. The presentation
//! layer feeds these straight into its download/export surface.

use crate::history::{DailyStats, HistoryLedger, RateRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv output was not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Serialize the ledger's records to CSV, oldest first.
///
/// Columns: `timestamp, market_rate, platform_rate, diff, risk_level`.
pub fn records_to_csv(ledger: &HistoryLedger) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in ledger.records() {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|error| ExportError::Csv(error.into_error().into()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Parse records back from CSV produced by [`records_to_csv`].
pub fn records_from_csv(data: &str) -> Result<Vec<RateRecord>, ExportError> {
    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Serialize the daily rollups to CSV, oldest-touched first.
pub fn daily_to_csv(ledger: &HistoryLedger) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for stats in ledger.daily_stats() {
        writer.serialize(stats)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|error| ExportError::Csv(error.into_error().into()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Parse daily rollups back from CSV produced by [`daily_to_csv`].
pub fn daily_from_csv(data: &str) -> Result<Vec<DailyStats>, ExportError> {
    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
