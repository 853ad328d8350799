use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single upstream rate source.
///
/// Recovered locally by excluding that source from aggregation; only becomes
/// fatal when every source in a cycle fails.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum SourceError {
    #[error("http request to {source} failed: {message}")]
    Http { r#source: String, message: String },

    #[error("response from {source} could not be parsed: {message}")]
    Parse { r#source: String, message: String },

    #[error("{source} returned a non-positive rate: {rate}")]
    InvalidRate { r#source: String, rate: String },
}

impl SourceError {
    /// Name of the source this error originated from.
    pub fn source_name(&self) -> &str {
        match self {
            SourceError::Http { source, .. } => source,
            SourceError::Parse { source, .. } => source,
            SourceError::InvalidRate { source, .. } => source,
        }
    }
}

/// All errors generated in `spreadwatch`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum MonitorError {
    /// Every configured rate source failed in the same fetch cycle. The
    /// cycle leaves all monitor state untouched.
    #[error("all rate sources failed, last error: {last}")]
    AllSourcesFailed { last: SourceError },

    /// The aggregator was constructed with zero sources.
    #[error("no rate sources configured")]
    SourcesEmpty,

    /// A fetch cycle was requested before `init` loaded the external store.
    #[error("monitor not initialised")]
    NotReady,

    /// A settings-store value could not be parsed as a decimal.
    #[error("invalid setting {key}: {value:?}")]
    Settings { key: String, value: String },

    /// A write to the external store failed. Logged and swallowed by the
    /// fire-and-forget sync path; never rolls back in-memory state.
    #[error("persistence sync failed: {0}")]
    PersistenceSync(String),
}

impl MonitorError {
    /// Whether this error must surface as a user-visible error state
    /// (as opposed to being recovered or swallowed internally).
    pub fn is_user_visible(&self) -> bool {
        match self {
            MonitorError::AllSourcesFailed { .. } => true,
            MonitorError::SourcesEmpty => true,
            MonitorError::NotReady => true,
            MonitorError::Settings { .. } => true,
            MonitorError::PersistenceSync(_) => false,
        }
    }
}
