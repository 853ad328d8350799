//! External persistence collaborators.
//!
//! The monitor treats its in-memory state as authoritative: writes to the
//! external store run as detached tasks, are never awaited by the fetch
//! cycle, and a failure is logged at `warn` and dropped. There is no retry
//! or replay queue.

use crate::error::MonitorError;
use crate::history::{DailyStats, RateRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Process-wide key-value settings store.
///
/// Values are decimal strings keyed by the names in [`crate::settings`];
/// fetched in bulk at init.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<HashMap<String, String>, MonitorError>;

    async fn save(&self, values: HashMap<String, String>) -> Result<(), MonitorError>;
}

/// External mirror of the history ledger and daily rollups.
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Load previously mirrored records, oldest first, for state rebuild at
    /// init.
    async fn load_records(&self) -> Result<Vec<RateRecord>, MonitorError>;

    /// Mirror one accepted record (append-only collection).
    async fn append_record(&self, record: &RateRecord) -> Result<(), MonitorError>;

    /// Mirror one daily rollup (keyed upsert by date).
    async fn upsert_daily(&self, stats: &DailyStats) -> Result<(), MonitorError>;
}

/// Mirror a record and its day's rollup on a detached task. The caller's
/// state transition has already happened and is never rolled back.
pub fn spawn_history_sync(
    sink: Arc<dyn HistorySink>,
    record: RateRecord,
    daily: Option<DailyStats>,
) {
    tokio::spawn(async move {
        if let Err(error) = sink.append_record(&record).await {
            warn!(%error, "history record sync failed");
        }
        if let Some(stats) = daily {
            if let Err(error) = sink.upsert_daily(&stats).await {
                warn!(%error, date = %stats.date, "daily stats sync failed");
            }
        }
    });
}

/// In-memory store, used by tests and as a default when the deployment has
/// no backend configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: parking_lot::RwLock<HashMap<String, String>>,
    records: parking_lot::RwLock<Vec<RateRecord>>,
    daily: parking_lot::RwLock<HashMap<chrono::NaiveDate, DailyStats>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(values: HashMap<String, String>) -> Self {
        Self {
            settings: parking_lot::RwLock::new(values),
            ..Self::default()
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    pub fn daily_count(&self) -> usize {
        self.daily.read().len()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<HashMap<String, String>, MonitorError> {
        Ok(self.settings.read().clone())
    }

    async fn save(&self, values: HashMap<String, String>) -> Result<(), MonitorError> {
        *self.settings.write() = values;
        Ok(())
    }
}

#[async_trait]
impl HistorySink for MemoryStore {
    async fn load_records(&self) -> Result<Vec<RateRecord>, MonitorError> {
        Ok(self.records.read().clone())
    }

    async fn append_record(&self, record: &RateRecord) -> Result<(), MonitorError> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn upsert_daily(&self, stats: &DailyStats) -> Result<(), MonitorError> {
        self.daily.write().insert(stats.date, stats.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskLevel;
    use chrono::{TimeZone, Utc};

    fn sample_record() -> RateRecord {
        RateRecord::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            4.51,
            4.45,
            RiskLevel::Warning,
        )
    }

    #[tokio::test]
    async fn test_memory_store_settings_round_trip() {
        let store = MemoryStore::new();
        let values = HashMap::from([("platform_rate".to_string(), "4.45".to_string())]);

        store.save(values.clone()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), values);
    }

    #[tokio::test]
    async fn test_spawn_history_sync_mirrors_record() {
        let store = Arc::new(MemoryStore::new());
        spawn_history_sync(store.clone(), sample_record(), None);

        // Detached task; yield until it lands.
        for _ in 0..100 {
            if store.record_count() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(store.record_count(), 1);
        assert_eq!(store.daily_count(), 0);
    }
}
