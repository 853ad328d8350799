//! File-backed persistence: settings as JSON, history as JSON lines, daily
//! rollups as a keyed JSON map. Good enough for a single-host deployment;
//! swap in a real backend by implementing the same two traits.

use async_trait::async_trait;
use chrono::NaiveDate;
use spreadwatch::{DailyStats, HistorySink, MonitorError, RateRecord, SettingsStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FileStore {
    settings_path: PathBuf,
    records_path: PathBuf,
    daily_path: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            settings_path: dir.join("settings.json"),
            records_path: dir.join("records.jsonl"),
            daily_path: dir.join("daily.json"),
        }
    }

    pub async fn ensure_dir(&self) -> Result<(), MonitorError> {
        if let Some(parent) = self.settings_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(sync_error)?;
        }
        Ok(())
    }
}

fn sync_error(error: impl std::fmt::Display) -> MonitorError {
    MonitorError::PersistenceSync(error.to_string())
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn load(&self) -> Result<HashMap<String, String>, MonitorError> {
        match tokio::fs::read_to_string(&self.settings_path).await {
            Ok(data) => serde_json::from_str(&data).map_err(sync_error),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.settings_path.display(), "no settings file, using defaults");
                Ok(HashMap::new())
            }
            Err(error) => Err(sync_error(error)),
        }
    }

    async fn save(&self, values: HashMap<String, String>) -> Result<(), MonitorError> {
        let data = serde_json::to_string_pretty(&values).map_err(sync_error)?;
        tokio::fs::write(&self.settings_path, data)
            .await
            .map_err(sync_error)
    }
}

#[async_trait]
impl HistorySink for FileStore {
    async fn load_records(&self) -> Result<Vec<RateRecord>, MonitorError> {
        let data = match tokio::fs::read_to_string(&self.records_path).await {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(sync_error(error)),
        };

        let mut records = Vec::new();
        for line in data.lines().filter(|line| !line.trim().is_empty()) {
            records.push(serde_json::from_str(line).map_err(sync_error)?);
        }
        Ok(records)
    }

    async fn append_record(&self, record: &RateRecord) -> Result<(), MonitorError> {
        use tokio::io::AsyncWriteExt;

        let mut line = serde_json::to_string(record).map_err(sync_error)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)
            .await
            .map_err(sync_error)?;
        file.write_all(line.as_bytes()).await.map_err(sync_error)
    }

    async fn upsert_daily(&self, stats: &DailyStats) -> Result<(), MonitorError> {
        let mut by_date: HashMap<NaiveDate, DailyStats> =
            match tokio::fs::read_to_string(&self.daily_path).await {
                Ok(data) => serde_json::from_str(&data).map_err(sync_error)?,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
                Err(error) => return Err(sync_error(error)),
            };

        by_date.insert(stats.date, stats.clone());
        let data = serde_json::to_string_pretty(&by_date).map_err(sync_error)?;
        tokio::fs::write(&self.daily_path, data)
            .await
            .map_err(sync_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use spreadwatch::RiskLevel;

    fn temp_store(tag: &str) -> FileStore {
        let dir = std::env::temp_dir().join(format!(
            "spreadwatch-test-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        FileStore::new(dir)
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let store = temp_store("settings");
        store.ensure_dir().await.unwrap();

        let values = HashMap::from([("platform_rate".to_string(), "4.45".to_string())]);
        store.save(values.clone()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), values);
    }

    #[tokio::test]
    async fn test_missing_files_load_empty() {
        let store = temp_store("missing");
        store.ensure_dir().await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
        assert!(store.load_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_append_and_reload() {
        let store = temp_store("records");
        store.ensure_dir().await.unwrap();

        let first = RateRecord::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            4.51,
            4.45,
            RiskLevel::Warning,
        );
        let second = RateRecord::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 5, 0).unwrap(),
            4.52,
            4.45,
            RiskLevel::Warning,
        );

        store.append_record(&first).await.unwrap();
        store.append_record(&second).await.unwrap();

        let loaded = store.load_records().await.unwrap();
        assert_eq!(loaded, vec![first, second]);
    }
}
