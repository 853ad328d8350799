//! Volatility dampening for the published market rate.
//!
//! Raw aggregated quotes jitter between refreshes. The filter applies the
//! configured USDT premium, clamps the single-cycle move to 0.3% of the
//! previous published rate, then blends 90/10 toward the clamped target.
//! The cost is a small response lag; the gain is a display rate that never
//! jumps discontinuously.

use serde::{Deserialize, Serialize};

/// Maximum single-cycle change as a fraction of the previous published rate.
pub const MAX_STEP_RATIO: f64 = 0.003;

/// Weight of the previous published rate in the exponential blend.
pub const SMOOTHING_ALPHA: f64 = 0.9;

/// Stateful smoothing filter over successive aggregated rates.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RateSmoother {
    published: f64,
}

impl RateSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously published rate (e.g. restored from the
    /// external store at init).
    pub fn with_published(published: f64) -> Self {
        Self { published }
    }

    /// Last published rate, 0.0 until the first update.
    pub fn published(&self) -> f64 {
        self.published
    }

    /// Feed a raw aggregated rate; returns the new published rate.
    ///
    /// The first reading publishes the premium-adjusted target directly,
    /// with no clamp or blend to lag behind.
    pub fn update(&mut self, raw: f64, premium: f64) -> f64 {
        let target = raw * (1.0 + premium);

        self.published = if self.published > 0.0 {
            let clamped = clamp_step(self.published, target);
            SMOOTHING_ALPHA * self.published + (1.0 - SMOOTHING_ALPHA) * clamped
        } else {
            target
        };

        self.published
    }
}

/// Clip `target` so that `|target - previous| <= MAX_STEP_RATIO * previous`,
/// toward the direction of change.
fn clamp_step(previous: f64, target: f64) -> f64 {
    let max_step = previous * MAX_STEP_RATIO;
    if target > previous + max_step {
        previous + max_step
    } else if target < previous - max_step {
        previous - max_step
    } else {
        target
    }
}
