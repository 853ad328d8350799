/// Spreadwatch - USDT/MYR spread monitoring engine
///
/// Monitors the spread between the floating USDT/MYR market rate and a
/// manually-set platform rate. The pipeline per fetch cycle:
/// - aggregate quotes from multiple unreliable sources (weighted
///   outlier-filtered average)
/// - smooth the aggregated rate (premium, 0.3% step clamp, 90/10 blend)
/// - classify the spread into safe/warning/danger/critical with
///   lock-window-sensitive hysteresis
/// - append to a 7-day rolling history with per-day rollups
/// - mirror the accepted record to the external store, fire-and-forget
///
/// Sign convention throughout: `diff = market_rate - platform_rate`.
pub mod error;
pub mod export;
pub mod history;
pub mod monitor;
pub mod persistence;
pub mod risk;
pub mod scheduler;
pub mod settings;
pub mod smoothing;
pub mod source;
pub mod window;

// Re-export commonly used types for convenience
pub use error::{MonitorError, SourceError};
pub use history::{AppendOutcome, DailyStats, HistoryLedger, RateRecord};
pub use monitor::{MonitorSnapshot, SpreadMonitor};
pub use persistence::{HistorySink, MemoryStore, SettingsStore};
pub use risk::{ExpansionTracker, RiskLevel, classify};
pub use scheduler::RefreshScheduler;
pub use settings::{MonitorSettings, Thresholds};
pub use smoothing::RateSmoother;
pub use source::{RateAggregator, RateSource};
