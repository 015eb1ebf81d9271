//! Batch stepper: the job state machine
//!
//! Two phases, idle and running, with all state in the progress store. The
//! scheduler invokes `step` unconditionally; the step itself decides whether
//! there is work. A start performs its first step inline so the operator
//! sees progress before the next timer tick.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::application::processor::ImageProcessor;
use crate::domain::job::{
    JobStatePatch, JobStatus, Outcome, RunToken, StepReport, Toggled,
};
use crate::domain::repositories::CandidateRepository;
use crate::infrastructure::progress_store::ProgressStore;

pub struct BatchStepper {
    progress: ProgressStore,
    repository: Arc<dyn CandidateRepository>,
    processor: ImageProcessor,
    batch_size: u32,
}

impl BatchStepper {
    pub fn new(
        progress: ProgressStore,
        repository: Arc<dyn CandidateRepository>,
        processor: ImageProcessor,
        batch_size: u32,
    ) -> Self {
        Self {
            progress,
            repository,
            processor,
            batch_size,
        }
    }

    pub async fn status(&self) -> Result<JobStatus> {
        Ok(JobStatus::from(&self.progress.get().await?))
    }

    /// Start if idle, stop if running.
    pub async fn toggle(&self) -> Result<Toggled> {
        if self.progress.get().await?.running {
            self.stop().await?;
            Ok(Toggled::Stopped)
        } else {
            self.start().await?;
            Ok(Toggled::Started)
        }
    }

    /// Begin a fresh run: fix the total, zero the counters, take the lease,
    /// then process the first page inline.
    pub async fn start(&self) -> Result<StepReport> {
        let run = RunToken::mint();
        let total = self.repository.count_candidates(Some(&run)).await?;
        self.progress.reset_for_run(total, &run).await?;
        info!(total, run = %run, "image replacement run started");
        self.step().await
    }

    /// Stop the run. Counters and total stay readable as the frozen summary
    /// of the partial run until the next start.
    pub async fn stop(&self) -> Result<()> {
        self.progress
            .apply(&JobStatePatch {
                running: Some(false),
                offset: Some(0),
                run_token: Some(None),
                ..Default::default()
            })
            .await?;
        info!("image replacement run stopped");
        Ok(())
    }

    /// Process at most one page. Selector or store errors propagate with the
    /// persisted state untouched, so the next tick retries the same page.
    pub async fn step(&self) -> Result<StepReport> {
        let state = self.progress.get().await?;
        if !state.running {
            return Ok(StepReport::Skipped);
        }
        let Some(run) = state.run_token.clone() else {
            // Running without a lease should not happen; recover to idle.
            warn!("running flag set without a run token, stopping");
            self.stop().await?;
            return Ok(StepReport::Skipped);
        };

        let page = self
            .repository
            .candidate_page(Some(&run), self.batch_size, state.offset)
            .await?;

        let mut succeeded = 0u32;
        let mut failed = 0u32;
        for item in &page {
            match self.processor.process(item, &run).await {
                Outcome::Success => succeeded += 1,
                Outcome::Failure => failed += 1,
            }
        }

        // Re-check the lease before persisting: a competing start or a stop
        // during the page must win, and this step's accounting is discarded.
        let current = self.progress.get().await?;
        if current.run_token.as_ref() != Some(&run) {
            warn!(run = %run, "run lease superseded mid-step, discarding page counters");
            return Ok(StepReport::Stale);
        }

        let page_len = page.len();
        let processed = current.processed + page_len as u32;
        let succeeded_total = current.succeeded + succeeded;
        let failed_total = current.failed + failed;
        let completed = (page_len as u32) < self.batch_size || processed >= current.total;

        let mut patch = JobStatePatch {
            processed: Some(processed),
            succeeded: Some(succeeded_total),
            failed: Some(failed_total),
            ..Default::default()
        };
        if completed {
            patch.running = Some(false);
            patch.offset = Some(0);
            patch.run_token = Some(None);
        } else {
            patch.offset = Some(state.offset + self.batch_size);
        }
        self.progress.apply(&patch).await?;

        if completed {
            info!(
                total = current.total,
                processed,
                succeeded = succeeded_total,
                failed = failed_total,
                "image replacement run complete"
            );
            Ok(StepReport::Completed {
                page_len,
                succeeded,
                failed,
            })
        } else {
            let next_offset = state.offset + self.batch_size;
            info!(
                offset = state.offset,
                next_offset,
                page_len,
                succeeded,
                failed,
                "batch step finished"
            );
            Ok(StepReport::Progressed {
                page_len,
                succeeded,
                failed,
                next_offset,
            })
        }
    }
}
