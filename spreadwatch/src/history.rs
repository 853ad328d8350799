//! Bounded rolling history of spread readings and per-day rollups.
//!
//! The ledger owns every [`RateRecord`] after creation; records are never
//! mutated. Appends prune anything older than the 7-day window, and each
//! accepted record feeds an incremental per-day rollup capped at the 7
//! most-recently-touched dates.

use crate::risk::RiskLevel;
use crate::window;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rolling retention for point-in-time records.
pub const RETENTION_DAYS: i64 = 7;

/// Maximum number of distinct dates kept in the daily rollup.
pub const MAX_DAILY_ENTRIES: usize = 7;

/// Immutable point-in-time reading. `diff = market_rate - platform_rate`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateRecord {
    pub timestamp: DateTime<Utc>,
    pub market_rate: f64,
    pub platform_rate: f64,
    pub diff: f64,
    pub risk_level: RiskLevel,
}

impl RateRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        market_rate: f64,
        platform_rate: f64,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            timestamp,
            market_rate,
            platform_rate,
            diff: market_rate - platform_rate,
            risk_level,
        }
    }
}

/// Per-day aggregate, mutable until its date rolls over.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub max_diff: f64,
    pub min_diff: f64,
    pub avg_diff: f64,
    pub max_market_rate: f64,
    pub min_market_rate: f64,
    pub avg_market_rate: f64,
    pub platform_rate: f64,
    /// Worst risk level seen that day; never downgraded.
    pub risk_level: RiskLevel,
    /// Market rate captured in the 23:45-23:55 local window, if any reading
    /// landed there.
    pub lock_time_rate: Option<f64>,
    /// Number of records folded in; drives the running means.
    pub sample_count: u64,
}

impl DailyStats {
    fn from_record(date: NaiveDate, record: &RateRecord) -> Self {
        Self {
            date,
            max_diff: record.diff,
            min_diff: record.diff,
            avg_diff: record.diff,
            max_market_rate: record.market_rate,
            min_market_rate: record.market_rate,
            avg_market_rate: record.market_rate,
            platform_rate: record.platform_rate,
            risk_level: record.risk_level,
            lock_time_rate: None,
            sample_count: 1,
        }
    }

    fn fold(&mut self, record: &RateRecord) {
        self.max_diff = self.max_diff.max(record.diff);
        self.min_diff = self.min_diff.min(record.diff);
        self.max_market_rate = self.max_market_rate.max(record.market_rate);
        self.min_market_rate = self.min_market_rate.min(record.market_rate);

        // Running mean over all records seen for this date so far.
        let n = self.sample_count as f64;
        self.avg_diff = (self.avg_diff * n + record.diff) / (n + 1.0);
        self.avg_market_rate = (self.avg_market_rate * n + record.market_rate) / (n + 1.0);
        self.sample_count += 1;

        self.platform_rate = record.platform_rate;
        self.risk_level = self.risk_level.worst(record.risk_level);
    }
}

/// Append-only ledger of readings with 7-day retention plus the daily rollup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HistoryLedger {
    records: VecDeque<RateRecord>,
    /// Ordered oldest-touched first; touching a date moves it to the back.
    daily: VecDeque<DailyStats>,
}

/// Outcome of an append attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Record stored and folded into the daily rollup.
    Appended,
    /// Both rates unchanged from the last record at 4-decimal precision;
    /// nothing stored.
    Deduplicated,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from previously persisted records (oldest first), replaying
    /// the daily rollup.
    pub fn from_records(records: Vec<RateRecord>, now: DateTime<Utc>) -> Self {
        let mut ledger = Self::new();
        for record in records {
            ledger.append(record, now);
        }
        ledger
    }

    pub fn records(&self) -> impl Iterator<Item = &RateRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&RateRecord> {
        self.records.back()
    }

    /// Daily rollups, oldest-touched first.
    pub fn daily_stats(&self) -> impl Iterator<Item = &DailyStats> {
        self.daily.iter()
    }

    pub fn daily_for(&self, date: NaiveDate) -> Option<&DailyStats> {
        self.daily.iter().find(|stats| stats.date == date)
    }

    /// Append a reading. Prunes everything at or beyond the retention
    /// horizon first, then de-duplicates against the last stored record:
    /// when both rates are unchanged at 4-decimal precision the reading is
    /// dropped to avoid redundant storage while the rate is flat.
    pub fn append(&mut self, record: RateRecord, now: DateTime<Utc>) -> AppendOutcome {
        let horizon = now - Duration::days(RETENTION_DAYS);
        while let Some(front) = self.records.front() {
            if front.timestamp <= horizon {
                self.records.pop_front();
            } else {
                break;
            }
        }

        if let Some(last) = self.records.back() {
            if round4(last.market_rate) == round4(record.market_rate)
                && round4(last.platform_rate) == round4(record.platform_rate)
            {
                return AppendOutcome::Deduplicated;
            }
        }

        self.upsert_daily(&record);
        self.records.push_back(record);
        AppendOutcome::Appended
    }

    /// Fold a record into its date's rollup, creating the entry if needed
    /// and evicting the oldest-touched date beyond capacity.
    fn upsert_daily(&mut self, record: &RateRecord) {
        let date = window::local_date(record.timestamp);

        let mut stats = match self.daily.iter().position(|stats| stats.date == date) {
            Some(index) => {
                // Move to the back: most-recently-touched ordering.
                let mut stats = self
                    .daily
                    .remove(index)
                    .expect("position came from this deque");
                stats.fold(record);
                stats
            }
            None => DailyStats::from_record(date, record),
        };

        if window::is_lock_capture(record.timestamp) {
            stats.lock_time_rate = Some(record.market_rate);
        }

        self.daily.push_back(stats);
        while self.daily.len() > MAX_DAILY_ENTRIES {
            self.daily.pop_front();
        }
    }
}

/// Quantize to 4 decimal places for the de-duplication comparison.
fn round4(value: f64) -> i64 {
    (value * 10_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
    }

    fn record(timestamp: DateTime<Utc>, market: f64, platform: f64) -> RateRecord {
        RateRecord::new(timestamp, market, platform, RiskLevel::Safe)
    }

    #[test]
    fn test_diff_sign_convention() {
        let r = record(at(10, 12, 0), 4.55, 4.50);
        assert!((r.diff - 0.05).abs() < 1e-12);

        let r = record(at(10, 12, 0), 4.45, 4.50);
        assert!((r.diff + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_append_prunes_beyond_seven_days() {
        let mut ledger = HistoryLedger::new();
        // 2,200 records spread evenly over 8 days: one every ~315 seconds.
        let start = at(1, 0, 0);
        let total = 2_200u32;
        let step_secs = (8 * 24 * 3600) / total as i64;

        let mut now = start;
        for i in 0..total {
            now = start + Duration::seconds(step_secs * i as i64);
            // Distinct rates so de-duplication never kicks in.
            let market = 4.5 + (i as f64) * 0.0001;
            ledger.append(record(now, market, 4.45), now);
        }

        let horizon = now - Duration::days(7);
        assert!(ledger.records().all(|r| r.timestamp > horizon));
        // Roughly 7/8 of the appends survive.
        let expected = (total as f64 * 7.0 / 8.0) as usize;
        assert!(
            ledger.len() >= expected - 2 && ledger.len() <= expected + 2,
            "retained {} records, expected ~{}",
            ledger.len(),
            expected
        );
    }

    #[test]
    fn test_append_deduplicates_at_four_decimals() {
        let mut ledger = HistoryLedger::new();
        let now = at(10, 9, 0);

        assert_eq!(
            ledger.append(record(now, 4.5000, 4.45), now),
            AppendOutcome::Appended
        );
        // Same rates to 4 decimals: skipped.
        assert_eq!(
            ledger.append(record(now + Duration::minutes(5), 4.50004, 4.45), now),
            AppendOutcome::Deduplicated
        );
        // 4th decimal moved: stored.
        assert_eq!(
            ledger.append(record(now + Duration::minutes(10), 4.5001, 4.45), now),
            AppendOutcome::Appended
        );
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_daily_rollup_min_max_avg() {
        let mut ledger = HistoryLedger::new();
        let now = at(10, 9, 0);

        for (i, diff) in [0.01, 0.05, -0.02].iter().enumerate() {
            let ts = now + Duration::minutes(i as i64 * 10);
            ledger.append(record(ts, 4.50 + diff, 4.50), ts);
        }

        let date = window::local_date(now);
        let stats = ledger.daily_for(date).unwrap();
        assert!((stats.max_diff - 0.05).abs() < 1e-9);
        assert!((stats.min_diff + 0.02).abs() < 1e-9);
        assert!((stats.avg_diff - 0.04 / 3.0).abs() < 1e-9);
        assert_eq!(stats.sample_count, 3);
        assert!((stats.avg_market_rate - (4.51 + 4.55 + 4.48) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_daily_risk_never_downgrades() {
        let mut ledger = HistoryLedger::new();
        let now = at(10, 9, 0);

        ledger.append(
            RateRecord::new(now, 4.60, 4.50, RiskLevel::Danger),
            now,
        );
        ledger.append(
            RateRecord::new(now + Duration::minutes(10), 4.52, 4.50, RiskLevel::Safe),
            now,
        );

        let stats = ledger.daily_for(window::local_date(now)).unwrap();
        assert_eq!(stats.risk_level, RiskLevel::Danger);
    }

    #[test]
    fn test_lock_time_rate_captured() {
        let mut ledger = HistoryLedger::new();
        // 15:50 UTC is 23:50 local (GMT+8): inside the capture window.
        let capture = at(10, 15, 50);
        let before = at(10, 12, 0);

        ledger.append(record(before, 4.50, 4.45), before);
        let stats = ledger.daily_for(window::local_date(before)).unwrap();
        assert_eq!(stats.lock_time_rate, None);

        ledger.append(record(capture, 4.52, 4.45), capture);
        let stats = ledger.daily_for(window::local_date(capture)).unwrap();
        assert_eq!(stats.lock_time_rate, Some(4.52));
    }

    #[test]
    fn test_daily_retention_evicts_oldest_touched() {
        let mut ledger = HistoryLedger::new();

        for day in 1..=9u32 {
            let ts = at(day, 9, 0);
            // Distinct rates per day so nothing de-duplicates.
            ledger.append(record(ts, 4.5 + day as f64 * 0.001, 4.45), ts);
        }

        let dates: Vec<NaiveDate> = ledger.daily_stats().map(|s| s.date).collect();
        assert_eq!(dates.len(), MAX_DAILY_ENTRIES);
        // Days 1 and 2 were evicted.
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(
            dates.last().copied().unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_rebuild_from_records() {
        let now = at(10, 12, 0);
        let records = vec![
            record(at(10, 9, 0), 4.50, 4.45),
            record(at(10, 10, 0), 4.52, 4.45),
        ];

        let ledger = HistoryLedger::from_records(records, now);
        assert_eq!(ledger.len(), 2);
        let stats = ledger.daily_for(window::local_date(now)).unwrap();
        assert_eq!(stats.sample_count, 2);
    }
}
