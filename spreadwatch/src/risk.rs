//! Risk classification for the market/platform spread.
//!
//! The classifier is a pure function of the spread magnitude, the lock-window
//! flag and the consecutive-expansion counter. The expansion tracker supplies
//! the hysteresis: risk escalates faster when the spread has been growing for
//! several cycles in a row inside the lock window.

use crate::settings::Thresholds;
use serde::{Deserialize, Serialize};

/// Risk level of the current spread, ordered from calm to critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Safe,
    Warning,
    Danger,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Warning => "warning",
            RiskLevel::Danger => "danger",
            RiskLevel::Critical => "critical",
        }
    }

    /// The worse of two levels (ordinal comparison).
    pub fn worst(self, other: RiskLevel) -> RiskLevel {
        self.max(other)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(RiskLevel::Safe),
            "warning" => Ok(RiskLevel::Warning),
            "danger" => Ok(RiskLevel::Danger),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// Classify a spread reading. First match wins; thresholds compare against
/// the absolute spread magnitude (diff = market − platform may be negative).
///
/// Inside the lock window a spread that has expanded for two or more
/// consecutive cycles escalates straight to [`RiskLevel::Critical`] once it
/// clears the warning threshold, since the platform rate is about to reset
/// and there is no time left for the spread to mean-revert.
pub fn classify(
    spread: f64,
    is_lock_window: bool,
    consecutive_expansions: u32,
    thresholds: &Thresholds,
) -> RiskLevel {
    let magnitude = spread.abs();

    if magnitude >= thresholds.critical {
        return RiskLevel::Critical;
    }
    if is_lock_window && consecutive_expansions >= 2 && magnitude >= thresholds.warning {
        return RiskLevel::Critical;
    }
    if magnitude >= thresholds.danger {
        return RiskLevel::Danger;
    }
    if magnitude >= thresholds.warning {
        return RiskLevel::Warning;
    }
    // Safety net: lock-window readings at or above warning must never
    // fall through to Safe.
    if is_lock_window && magnitude >= thresholds.warning {
        return RiskLevel::Warning;
    }

    RiskLevel::Safe
}

/// Hysteresis counter over consecutive spread expansions.
///
/// One state machine with two implied states: "stable" (counter at 0) and
/// "expanding" (counter > 0). Evaluated once per fetch cycle against the
/// previous cycle's absolute spread.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExpansionTracker {
    previous_abs_spread: Option<f64>,
    consecutive_expansions: u32,
}

impl ExpansionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed this cycle's spread. Strictly growing magnitude increments the
    /// counter; anything else resets it. The first reading has nothing to
    /// compare against and leaves the counter at 0.
    ///
    /// Returns the updated counter value.
    pub fn observe(&mut self, spread: f64) -> u32 {
        let magnitude = spread.abs();
        match self.previous_abs_spread {
            Some(previous) if magnitude > previous => {
                self.consecutive_expansions += 1;
            }
            Some(_) => {
                self.consecutive_expansions = 0;
            }
            None => {}
        }
        self.previous_abs_spread = Some(magnitude);
        self.consecutive_expansions
    }

    /// Current counter value.
    pub fn consecutive_expansions(&self) -> u32 {
        self.consecutive_expansions
    }

    /// External reset hook, invoked when risk returns to safe (alert
    /// dismissal contract with the presentation layer).
    pub fn reset(&mut self) {
        self.consecutive_expansions = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_thresholds() -> Thresholds {
        Thresholds {
            warning: 0.05,
            danger: 0.08,
            critical: 0.10,
        }
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Safe < RiskLevel::Warning);
        assert!(RiskLevel::Warning < RiskLevel::Danger);
        assert!(RiskLevel::Danger < RiskLevel::Critical);
        assert_eq!(
            RiskLevel::Warning.worst(RiskLevel::Danger),
            RiskLevel::Danger
        );
        assert_eq!(RiskLevel::Critical.worst(RiskLevel::Safe), RiskLevel::Critical);
    }

    #[test]
    fn test_classify_threshold_boundaries() {
        struct TestCase {
            spread: f64,
            expected: RiskLevel,
        }

        let thresholds = default_thresholds();
        let tests = vec![
            // TC0: below warning
            TestCase {
                spread: 0.04,
                expected: RiskLevel::Safe,
            },
            // TC1: exactly at warning
            TestCase {
                spread: 0.05,
                expected: RiskLevel::Warning,
            },
            // TC2: exactly at danger
            TestCase {
                spread: 0.08,
                expected: RiskLevel::Danger,
            },
            // TC3: one cent below critical
            TestCase {
                spread: 0.09,
                expected: RiskLevel::Danger,
            },
            // TC4: exactly at critical
            TestCase {
                spread: 0.10,
                expected: RiskLevel::Critical,
            },
            // TC5: negative spread classified by magnitude
            TestCase {
                spread: -0.08,
                expected: RiskLevel::Danger,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = classify(test.spread, false, 0, &thresholds);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_classify_lock_window_escalation() {
        // Spread of 0.045 with warning=0.04 only qualifies as Warning on its
        // own, but two consecutive expansions inside the lock window
        // escalate it to Critical.
        let thresholds = Thresholds {
            warning: 0.04,
            danger: 0.08,
            critical: 0.10,
        };

        assert_eq!(
            classify(0.045, true, 2, &thresholds),
            RiskLevel::Critical
        );
        // Same reading outside the lock window stays Warning.
        assert_eq!(
            classify(0.045, false, 2, &thresholds),
            RiskLevel::Warning
        );
        // Same reading inside the window but without the expansion streak.
        assert_eq!(classify(0.045, true, 1, &thresholds), RiskLevel::Warning);
    }

    #[test]
    fn test_classify_critical_beats_escalation() {
        let thresholds = default_thresholds();
        assert_eq!(classify(0.12, true, 5, &thresholds), RiskLevel::Critical);
        assert_eq!(classify(0.12, false, 0, &thresholds), RiskLevel::Critical);
    }

    #[test]
    fn test_expansion_tracker_sequence() {
        let mut tracker = ExpansionTracker::new();
        let spreads = [0.01, 0.02, 0.03, 0.02];
        let expected = [0, 1, 2, 0];

        for (index, (spread, want)) in spreads.iter().zip(expected.iter()).enumerate() {
            let got = tracker.observe(*spread);
            assert_eq!(got, *want, "step {} failed", index);
        }
    }

    #[test]
    fn test_expansion_tracker_uses_magnitude() {
        let mut tracker = ExpansionTracker::new();
        tracker.observe(0.01);
        // -0.02 has a larger magnitude than 0.01, so the trend is expanding.
        assert_eq!(tracker.observe(-0.02), 1);
        // Equal magnitude is not strictly greater, so the counter resets.
        assert_eq!(tracker.observe(0.02), 0);
    }

    #[test]
    fn test_expansion_tracker_reset() {
        let mut tracker = ExpansionTracker::new();
        tracker.observe(0.01);
        tracker.observe(0.02);
        assert_eq!(tracker.consecutive_expansions(), 1);

        tracker.reset();
        assert_eq!(tracker.consecutive_expansions(), 0);
        // Previous spread is retained; the next observation still compares.
        assert_eq!(tracker.observe(0.03), 1);
    }
}
