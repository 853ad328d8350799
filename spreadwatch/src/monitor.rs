//! The spread monitor: owned state container and fetch-cycle orchestration.
//!
//! One fetch cycle runs at a time (the scheduler awaits each cycle to
//! completion), so the state container only needs a lock to let the
//! presentation layer snapshot it concurrently. A failed cycle records the
//! error for display and leaves rates, history and the expansion counter
//! exactly as they were.

use crate::error::MonitorError;
use crate::history::{AppendOutcome, HistoryLedger, RateRecord};
use crate::persistence::{self, HistorySink, SettingsStore};
use crate::risk::{self, ExpansionTracker, RiskLevel};
use crate::settings::MonitorSettings;
use crate::smoothing::RateSmoother;
use crate::source::RateAggregator;
use crate::window;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Read-only view of the monitor for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSnapshot {
    pub market_rate: f64,
    pub platform_rate: f64,
    /// `market_rate - effective platform rate` of the last successful cycle.
    pub diff: f64,
    pub risk_level: RiskLevel,
    pub consecutive_expansions: u32,
    /// Alert-dismissal flag. Owned by the presentation layer; the core only
    /// clears it when risk returns to safe.
    pub acknowledged: bool,
    pub in_lock_window: bool,
    pub last_updated: Option<DateTime<Utc>>,
    /// User-visible error state from the last failed cycle, cleared by the
    /// next successful one.
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct MonitorState {
    settings: MonitorSettings,
    smoother: RateSmoother,
    tracker: ExpansionTracker,
    ledger: HistoryLedger,
    risk_level: RiskLevel,
    diff: f64,
    acknowledged: bool,
    last_updated: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            settings: MonitorSettings::default(),
            smoother: RateSmoother::new(),
            tracker: ExpansionTracker::new(),
            ledger: HistoryLedger::new(),
            risk_level: RiskLevel::Safe,
            diff: 0.0,
            acknowledged: false,
            last_updated: None,
            last_error: None,
        }
    }
}

/// Core engine: aggregate → smooth → classify → append → detached sync.
pub struct SpreadMonitor {
    aggregator: RateAggregator,
    settings_store: Arc<dyn SettingsStore>,
    history_sink: Arc<dyn HistorySink>,
    state: RwLock<MonitorState>,
    ready: AtomicBool,
}

impl SpreadMonitor {
    pub fn new(
        aggregator: RateAggregator,
        settings_store: Arc<dyn SettingsStore>,
        history_sink: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            aggregator,
            settings_store,
            history_sink,
            state: RwLock::new(MonitorState::new()),
            ready: AtomicBool::new(false),
        }
    }

    /// Load settings and mirrored history from the external store and merge
    /// them into local state. Must complete before the scheduler starts;
    /// [`Self::run_cycle`] refuses to run until it has.
    pub async fn init(&self, now: DateTime<Utc>) -> Result<(), MonitorError> {
        let values = self.settings_store.load().await?;
        let settings = MonitorSettings::from_store(&values)?;

        let records = self.history_sink.load_records().await?;
        let ledger = HistoryLedger::from_records(records, now);
        let smoother = match ledger.last() {
            Some(record) => RateSmoother::with_published(record.market_rate),
            None => RateSmoother::new(),
        };

        {
            let mut state = self.state.write();
            state.settings = settings;
            state.ledger = ledger;
            state.smoother = smoother;
        }

        self.ready.store(true, Ordering::Release);
        info!("monitor initialised from external store");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Execute one fetch cycle at `now`. Also the manual-retry entry point:
    /// the retry button simply invokes this again.
    ///
    /// On aggregation failure no rate, history or counter state changes;
    /// only the user-visible error string is set.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<MonitorSnapshot, MonitorError> {
        if !self.is_ready() {
            return Err(MonitorError::NotReady);
        }

        let raw = match self.aggregator.aggregate().await {
            Ok(rate) => rate,
            Err(error) => {
                warn!(%error, "fetch cycle failed");
                let mut state = self.state.write();
                state.last_error = Some(error.to_string());
                return Err(error);
            }
        };

        // All awaits are behind us; the state transition itself is atomic
        // under the write lock.
        let mut state = self.state.write();

        let premium = state.settings.usdt_premium;
        let published = state.smoother.update(raw, premium);
        let platform = state.settings.effective_platform_rate();
        let diff = published - platform;

        let expansions = state.tracker.observe(diff);
        let in_lock_window = window::is_lock_window(now);
        let risk_level = risk::classify(diff, in_lock_window, expansions, &state.settings.thresholds);

        if risk_level == RiskLevel::Safe {
            state.tracker.reset();
            state.acknowledged = false;
        }

        let record = RateRecord::new(now, published, platform, risk_level);
        let outcome = state.ledger.append(record.clone(), now);
        let deduplicated = outcome == AppendOutcome::Deduplicated;

        state.risk_level = risk_level;
        state.diff = diff;
        state.last_updated = Some(now);
        state.last_error = None;

        if outcome == AppendOutcome::Appended {
            let daily = state
                .ledger
                .daily_for(window::local_date(now))
                .cloned();
            persistence::spawn_history_sync(self.history_sink.clone(), record, daily);
        }

        debug!(
            market_rate = published,
            diff,
            risk = %risk_level,
            expansions = state.tracker.consecutive_expansions(),
            lock_window = in_lock_window,
            deduplicated,
            "fetch cycle complete"
        );

        Ok(Self::snapshot_locked(&state, in_lock_window))
    }

    /// Current state for the presentation layer.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state.read();
        let in_lock_window = state
            .last_updated
            .map(window::is_lock_window)
            .unwrap_or(false);
        Self::snapshot_locked(&state, in_lock_window)
    }

    fn snapshot_locked(state: &MonitorState, in_lock_window: bool) -> MonitorSnapshot {
        MonitorSnapshot {
            market_rate: state.smoother.published(),
            platform_rate: state.settings.effective_platform_rate(),
            diff: state.diff,
            risk_level: state.risk_level,
            consecutive_expansions: state.tracker.consecutive_expansions(),
            acknowledged: state.acknowledged,
            in_lock_window,
            last_updated: state.last_updated,
            last_error: state.last_error.clone(),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> MonitorSettings {
        self.state.read().settings.clone()
    }

    /// Apply new settings (e.g. from the settings dialog) and persist them.
    /// The in-memory update is immediate; the store write is awaited here
    /// because the dialog needs to report save failures.
    pub async fn apply_settings(&self, settings: MonitorSettings) -> Result<(), MonitorError> {
        let values = {
            let mut state = self.state.write();
            state.settings = settings;
            state.settings.to_store()
        };
        self.settings_store.save(values).await
    }

    /// Borrow the ledger for export. Clones so no lock is held by callers.
    pub fn ledger(&self) -> HistoryLedger {
        self.state.read().ledger.clone()
    }

    /// Alert-dismissal contract: mark the current alert acknowledged.
    pub fn acknowledge(&self) {
        self.state.write().acknowledged = true;
    }

    /// Alert-dismissal contract: clear the acknowledged flag and the
    /// expansion streak (invoked by the presentation layer when the user
    /// dismisses a resolved alert).
    pub fn reset_acknowledged(&self) {
        let mut state = self.state.write();
        state.acknowledged = false;
        state.tracker.reset();
    }
}
