//! Background sweep for requests that outlived their deadline.
//!
//! Per-request timers normally resolve their own requests. The reaper lags
//! them by `grace` so it only catches entries whose timer never fired.

use crate::domain::ReaperConfig;
use crate::pending::PendingRequestTable;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub struct Reaper {
    table: Arc<PendingRequestTable>,
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(table: Arc<PendingRequestTable>, config: ReaperConfig) -> Self {
        Self { table, config }
    }

    /// Run a single sweep against `now`. Returns how many entries expired.
    pub fn sweep_once(&self, now: Instant) -> usize {
        let cutoff = now.checked_sub(self.config.grace).unwrap_or(now);
        let expired = self.table.sweep_expired(cutoff);
        if !expired.is_empty() {
            debug!(removed = expired.len(), "Reaped expired pending requests");
        }
        expired.len()
    }

    /// Sweep on every tick until `shutdown` flips to true or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut sweep_interval = tokio::time::interval(self.config.interval);
        sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = sweep_interval.tick() => {
                    self.sweep_once(Instant::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reaper stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
