//! Rate sources and the weighted outlier-filtered aggregator.
//!
//! Each source is an independent, unreliable upstream quoting the same
//! logical USDT/MYR rate. A fetch cycle queries all of them concurrently,
//! drops failures and statistical outliers, and averages the survivors by
//! each source's fixed trust weight.

use crate::error::{MonitorError, SourceError};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

/// Relative deviation from the reference mean beyond which a quote is
/// discarded as an outlier.
pub const OUTLIER_TOLERANCE: f64 = 0.01;

/// A single upstream quote source.
///
/// Implementations perform the remote call; no additional timeout is imposed
/// here, so a slow source simply delays that branch's settlement. All
/// branches settle before aggregation proceeds.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Stable identifier used in logs and error reporting.
    fn name(&self) -> &str;

    /// Fixed trust weight for the weighted mean. Higher means more trusted.
    fn weight(&self) -> f64;

    /// Fetch the current rate. Must return a positive rate on success.
    async fn fetch(&self) -> Result<f64, SourceError>;
}

/// One settled fetch attempt, kept only for the duration of aggregation.
#[derive(Debug, Clone)]
struct SourceQuote {
    name: String,
    weight: f64,
    rate: f64,
}

/// Aggregates quotes from a fixed set of sources into one trusted rate.
pub struct RateAggregator {
    sources: Vec<Box<dyn RateSource>>,
}

impl RateAggregator {
    pub fn new(sources: Vec<Box<dyn RateSource>>) -> Self {
        Self { sources }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Query all sources concurrently and combine the successes.
    ///
    /// Policy: unweighted mean of successes as reference; quotes deviating
    /// more than 1% relative from the reference are discarded; survivors are
    /// averaged by weight. If filtering removes everything, the reference
    /// mean stands. Zero successes fail with
    /// [`MonitorError::AllSourcesFailed`] carrying the last source error.
    pub async fn aggregate(&self) -> Result<f64, MonitorError> {
        if self.sources.is_empty() {
            return Err(MonitorError::SourcesEmpty);
        }

        let fetches = self.sources.iter().map(|source| async move {
            let result = source.fetch().await;
            (source.name().to_string(), source.weight(), result)
        });

        let mut quotes = Vec::with_capacity(self.sources.len());
        let mut last_error = None;

        for (name, weight, result) in join_all(fetches).await {
            match result {
                Ok(rate) => {
                    debug!(source = %name, rate, "source quote received");
                    quotes.push(SourceQuote { name, weight, rate });
                }
                Err(error) => {
                    warn!(source = %name, %error, "source fetch failed");
                    last_error = Some(error);
                }
            }
        }

        let Some(reference) = unweighted_mean(&quotes) else {
            let last = last_error.unwrap_or(SourceError::Http {
                source: "unknown".to_string(),
                message: "no sources settled".to_string(),
            });
            return Err(MonitorError::AllSourcesFailed { last });
        };

        let survivors: Vec<&SourceQuote> = quotes
            .iter()
            .filter(|quote| {
                let deviation = (quote.rate - reference).abs() / reference;
                if deviation > OUTLIER_TOLERANCE {
                    warn!(
                        source = %quote.name,
                        rate = quote.rate,
                        reference,
                        "discarding outlier quote"
                    );
                    false
                } else {
                    true
                }
            })
            .collect();

        let aggregated = weighted_mean(&survivors).unwrap_or(reference);
        debug!(
            aggregated,
            reference,
            quotes = quotes.len(),
            survivors = survivors.len(),
            "aggregation complete"
        );

        Ok(aggregated)
    }
}

fn unweighted_mean(quotes: &[SourceQuote]) -> Option<f64> {
    if quotes.is_empty() {
        return None;
    }
    let sum: f64 = quotes.iter().map(|quote| quote.rate).sum();
    Some(sum / quotes.len() as f64)
}

fn weighted_mean(quotes: &[&SourceQuote]) -> Option<f64> {
    let mut sum_wr = 0.0;
    let mut sum_w = 0.0;

    for quote in quotes {
        sum_wr += quote.rate * quote.weight;
        sum_w += quote.weight;
    }

    if sum_w > 0.0 { Some(sum_wr / sum_w) } else { None }
}
