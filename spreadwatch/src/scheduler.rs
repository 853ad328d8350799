//! Adaptive refresh scheduler.
//!
//! Drives the monitor's fetch cycles at an interval chosen by a policy
//! function, re-evaluated on a fixed one-minute cadence so entering or
//! leaving the lock window changes the cadence promptly. Cycles run inline
//! in the scheduler task and are awaited to completion, so no two cycles
//! ever overlap.

use crate::error::MonitorError;
use crate::monitor::SpreadMonitor;
use crate::window;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// How often the interval policy is re-evaluated.
pub const EVAL_CADENCE: Duration = Duration::from_secs(60);

/// Cancellable periodic fetch task.
#[derive(Debug)]
pub struct RefreshScheduler {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl RefreshScheduler {
    /// Start with the default lock-window cadence policy. Fails with
    /// [`MonitorError::NotReady`] if the monitor has not been initialised:
    /// the external store must be loaded before the fetch loop may begin.
    pub fn start(monitor: Arc<SpreadMonitor>) -> Result<Self, MonitorError> {
        Self::with_policy(monitor, EVAL_CADENCE, window::refresh_interval)
    }

    /// Start with a custom policy and evaluation cadence.
    pub fn with_policy<P>(
        monitor: Arc<SpreadMonitor>,
        cadence: Duration,
        policy: P,
    ) -> Result<Self, MonitorError>
    where
        P: Fn(DateTime<Utc>) -> Duration + Send + Sync + 'static,
    {
        if !monitor.is_ready() {
            return Err(MonitorError::NotReady);
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_run: Option<Instant> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        let period = policy(now);
                        let due = last_run.is_none_or(|at| at.elapsed() >= period);
                        if !due {
                            continue;
                        }

                        // Awaited to completion: the next tick cannot start
                        // a cycle while this one is in flight.
                        match monitor.run_cycle(now).await {
                            Ok(snapshot) => info!(
                                market_rate = snapshot.market_rate,
                                diff = snapshot.diff,
                                risk = %snapshot.risk_level,
                                "scheduled cycle complete"
                            ),
                            Err(error) => warn!(%error, "scheduled cycle failed"),
                        }
                        last_run = Some(Instant::now());
                    }
                    _ = shutdown_rx.changed() => {
                        info!("refresh scheduler stopping");
                        break;
                    }
                }
            }
        });

        Ok(Self { handle, shutdown })
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
