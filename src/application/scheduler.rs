//! Scheduled trigger for the batch stepper
//!
//! A plain interval task stands in for the host cron: it fires every tick
//! while the service is up and lets the step decide whether a run is in
//! progress. Cancellation comes from the shutdown token; persisted job state
//! is left in place.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::stepper::BatchStepper;
use crate::domain::job::StepReport;

pub fn spawn_scheduler(
    stepper: Arc<BatchStepper>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // A slow step must not cause a burst of catch-up steps.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; a start already steps inline,
        // so consume it and begin stepping one interval out.
        ticker.tick().await;

        info!(interval_secs = interval.as_secs(), "batch scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("batch scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match stepper.step().await {
                        Ok(StepReport::Skipped) => debug!("no run in progress"),
                        Ok(report) => debug!(?report, "scheduled step finished"),
                        // State is untouched on a failed step; the next tick
                        // retries the same page.
                        Err(e) => error!(error = %e, "scheduled step failed"),
                    }
                }
            }
        }
    })
}
