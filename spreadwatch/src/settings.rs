//! Monitor settings loaded from the external key-value settings store.
//!
//! All values travel as decimal strings and are parsed once at init. Unknown
//! keys are ignored; missing keys keep their defaults so a partially
//! populated store still produces a usable configuration.

use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const KEY_PLATFORM_RATE: &str = "platform_rate";
pub const KEY_COST_BUFFER: &str = "cost_buffer";
pub const KEY_WARNING_THRESHOLD: &str = "warning_threshold";
pub const KEY_DANGER_THRESHOLD: &str = "danger_threshold";
pub const KEY_CRITICAL_THRESHOLD: &str = "critical_threshold";
pub const KEY_USDT_PREMIUM: &str = "usdt_premium";

/// Spread magnitudes at which risk escalates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    pub warning: f64,
    pub danger: f64,
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 0.05,
            danger: 0.08,
            critical: 0.10,
        }
    }
}

/// Full monitor configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitorSettings {
    /// Manually-set platform rate the market rate is compared against.
    pub platform_rate: f64,
    /// Additive buffer applied to the platform rate when computing the
    /// effective spread (covers fees/slippage baked into the platform quote).
    pub cost_buffer: f64,
    pub thresholds: Thresholds,
    /// Multiplicative premium applied to the raw aggregated rate before
    /// smoothing (USDT typically trades at a premium to the official rate).
    pub usdt_premium: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            platform_rate: 0.0,
            cost_buffer: 0.0,
            thresholds: Thresholds::default(),
            usdt_premium: 0.0,
        }
    }
}

impl MonitorSettings {
    /// Platform rate adjusted by the cost buffer; the spread is computed
    /// against this effective value.
    pub fn effective_platform_rate(&self) -> f64 {
        self.platform_rate + self.cost_buffer
    }

    /// Parse settings from the store's decimal-string map, starting from
    /// defaults. A present-but-malformed value is an error rather than a
    /// silent fallback, so a typo in the store cannot quietly disable a
    /// threshold.
    pub fn from_store(values: &HashMap<String, String>) -> Result<Self, MonitorError> {
        let mut settings = Self::default();

        if let Some(value) = values.get(KEY_PLATFORM_RATE) {
            settings.platform_rate = parse_decimal(KEY_PLATFORM_RATE, value)?;
        }
        if let Some(value) = values.get(KEY_COST_BUFFER) {
            settings.cost_buffer = parse_decimal(KEY_COST_BUFFER, value)?;
        }
        if let Some(value) = values.get(KEY_WARNING_THRESHOLD) {
            settings.thresholds.warning = parse_decimal(KEY_WARNING_THRESHOLD, value)?;
        }
        if let Some(value) = values.get(KEY_DANGER_THRESHOLD) {
            settings.thresholds.danger = parse_decimal(KEY_DANGER_THRESHOLD, value)?;
        }
        if let Some(value) = values.get(KEY_CRITICAL_THRESHOLD) {
            settings.thresholds.critical = parse_decimal(KEY_CRITICAL_THRESHOLD, value)?;
        }
        if let Some(value) = values.get(KEY_USDT_PREMIUM) {
            settings.usdt_premium = parse_decimal(KEY_USDT_PREMIUM, value)?;
        }

        Ok(settings)
    }

    /// Serialize back to the store's decimal-string representation.
    pub fn to_store(&self) -> HashMap<String, String> {
        HashMap::from([
            (KEY_PLATFORM_RATE.to_string(), self.platform_rate.to_string()),
            (KEY_COST_BUFFER.to_string(), self.cost_buffer.to_string()),
            (
                KEY_WARNING_THRESHOLD.to_string(),
                self.thresholds.warning.to_string(),
            ),
            (
                KEY_DANGER_THRESHOLD.to_string(),
                self.thresholds.danger.to_string(),
            ),
            (
                KEY_CRITICAL_THRESHOLD.to_string(),
                self.thresholds.critical.to_string(),
            ),
            (KEY_USDT_PREMIUM.to_string(), self.usdt_premium.to_string()),
        ])
    }
}

fn parse_decimal(key: &str, value: &str) -> Result<f64, MonitorError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| MonitorError::Settings {
            key: key.to_string(),
            value: value.to_string(),
        })
}
