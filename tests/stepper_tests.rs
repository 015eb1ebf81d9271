//! End-to-end scenarios for the batch stepper state machine.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use cdn_image_replace::application::{BatchStepper, ImageProcessor};
use cdn_image_replace::domain::{
    CandidateRepository, JobStatePatch, ReplaceError, RunToken, StepReport, Toggled,
    TransformFetcher,
};
use cdn_image_replace::infrastructure::{LocalImageStore, ProgressStore};

use common::{source_url, TestJob, PUBLIC_BASE};

#[tokio::test]
async fn seven_hundred_images_complete_in_three_steps() {
    let job = TestJob::with_images(300, 700).await;

    // Start performs the first step inline.
    let report = job.stepper.start().await.unwrap();
    assert_eq!(
        report,
        StepReport::Progressed {
            page_len: 300,
            succeeded: 300,
            failed: 0,
            next_offset: 300,
        }
    );

    let state = job.progress.get().await.unwrap();
    assert!(state.running);
    assert_eq!(state.offset, 300);
    assert_eq!(state.total, 700);

    let report = job.stepper.step().await.unwrap();
    assert_eq!(
        report,
        StepReport::Progressed {
            page_len: 300,
            succeeded: 300,
            failed: 0,
            next_offset: 600,
        }
    );

    let report = job.stepper.step().await.unwrap();
    assert_eq!(
        report,
        StepReport::Completed {
            page_len: 100,
            succeeded: 100,
            failed: 0,
        }
    );

    let status = job.stepper.status().await.unwrap();
    assert!(!status.running);
    assert_eq!(status.total, 700);
    assert_eq!(status.processed, 700);
    assert_eq!(status.succeeded, 700);
    assert_eq!(status.failed, 0);

    // The lease is released and a stale timer tick is a no-op.
    assert!(job.progress.get().await.unwrap().run_token.is_none());
    assert_eq!(job.stepper.step().await.unwrap(), StepReport::Skipped);

    // The originals were overwritten in place under the storage root.
    let first = job.media.path().join("products/0.jpg");
    assert_eq!(std::fs::read(first).unwrap(), b"transformed-bytes");
    assert_eq!(job.fetcher.fetch_count(), 700);
}

#[tokio::test]
async fn counters_reconcile_after_every_step() {
    let job = TestJob::with_images(4, 10).await;
    for i in [1u32, 5, 6] {
        job.fetcher.fail_with_empty_body(&source_url(i));
    }

    job.stepper.start().await.unwrap();
    loop {
        let state = job.progress.get().await.unwrap();
        assert!(state.counters_consistent());
        if !state.running {
            break;
        }
        job.stepper.step().await.unwrap();
    }

    let status = job.stepper.status().await.unwrap();
    assert_eq!(status.processed, 10);
    assert_eq!(status.succeeded, 7);
    assert_eq!(status.failed, 3);

    // Failed items stay unmarked and remain candidates for a later run.
    assert_eq!(job.repository.count_candidates(None).await.unwrap(), 3);
}

#[tokio::test]
async fn empty_body_failure_is_retried_by_a_later_run() {
    let job = TestJob::with_images(300, 1).await;
    job.fetcher.fail_with_empty_body(&source_url(0));

    let report = job.stepper.start().await.unwrap();
    assert_eq!(
        report,
        StepReport::Completed {
            page_len: 1,
            succeeded: 0,
            failed: 1,
        }
    );
    assert_eq!(job.repository.count_candidates(None).await.unwrap(), 1);
    assert!(!job.media.path().join("products/0.jpg").exists());

    // The endpoint recovers; a later manual run picks the item up again.
    job.fetcher.clear_failures();
    let report = job.stepper.start().await.unwrap();
    assert_eq!(
        report,
        StepReport::Completed {
            page_len: 1,
            succeeded: 1,
            failed: 0,
        }
    );
    assert_eq!(job.repository.count_candidates(None).await.unwrap(), 0);
}

#[tokio::test]
async fn resumes_from_persisted_offset_after_restart() {
    let job = TestJob::with_images(300, 600).await;

    job.stepper.start().await.unwrap();
    assert_eq!(job.fetcher.fetch_count(), 300);

    // Simulate a redeploy between steps: new stepper, same database.
    let (stepper, fetcher) = job.restart();
    let report = stepper.step().await.unwrap();
    assert_eq!(
        report,
        StepReport::Completed {
            page_len: 300,
            succeeded: 300,
            failed: 0,
        }
    );

    // Only the unfinished half was fetched again; nothing was reprocessed.
    assert_eq!(fetcher.fetch_count(), 300);
    for url in fetcher.fetched_urls() {
        let index: u32 = url
            .rsplit('/')
            .next()
            .unwrap()
            .trim_end_matches(".jpg")
            .parse()
            .unwrap();
        assert!(index >= 300);
    }

    let status = stepper.status().await.unwrap();
    assert_eq!(status.processed, 600);
    assert!(!status.running);
}

#[tokio::test]
async fn stop_freezes_counters_and_start_recomputes_total() {
    let job = TestJob::with_images(300, 400).await;

    job.stepper.start().await.unwrap();
    job.stepper.stop().await.unwrap();

    let status = job.stepper.status().await.unwrap();
    assert!(!status.running);
    assert_eq!(status.total, 400);
    assert_eq!(status.processed, 300);

    let state = job.progress.get().await.unwrap();
    assert_eq!(state.offset, 0);
    assert!(state.run_token.is_none());

    // A stale timer tick after the stop does nothing.
    assert_eq!(job.stepper.step().await.unwrap(), StepReport::Skipped);

    // The next start resets counters and sees only what is left.
    let report = job.stepper.start().await.unwrap();
    assert_eq!(
        report,
        StepReport::Completed {
            page_len: 100,
            succeeded: 100,
            failed: 0,
        }
    );
    let status = job.stepper.status().await.unwrap();
    assert_eq!(status.total, 100);
    assert_eq!(status.processed, 100);
}

#[tokio::test]
async fn toggle_starts_then_stops() {
    let job = TestJob::with_images(300, 700).await;

    assert_eq!(job.stepper.toggle().await.unwrap(), Toggled::Started);
    assert!(job.stepper.status().await.unwrap().running);

    assert_eq!(job.stepper.toggle().await.unwrap(), Toggled::Stopped);
    let status = job.stepper.status().await.unwrap();
    assert!(!status.running);
    // Counters from the partial run stay readable after the stop.
    assert_eq!(status.processed, 300);
}

/// Transform stub that replaces the run lease while the first page is being
/// processed, as a competing start would.
struct HijackFetcher {
    progress: ProgressStore,
    hijacked: AtomicBool,
}

#[async_trait]
impl TransformFetcher for HijackFetcher {
    async fn fetch_transformed(&self, _source_url: &str) -> Result<Vec<u8>, ReplaceError> {
        if !self.hijacked.swap(true, Ordering::SeqCst) {
            self.progress
                .apply(&JobStatePatch {
                    run_token: Some(Some(RunToken::mint())),
                    ..Default::default()
                })
                .await
                .map_err(|e| ReplaceError::Http(e.to_string()))?;
        }
        Ok(b"transformed-bytes".to_vec())
    }
}

#[tokio::test]
async fn superseded_lease_discards_page_counters() {
    let job = TestJob::with_images(300, 2).await;

    let fetcher = Arc::new(HijackFetcher {
        progress: job.progress.clone(),
        hijacked: AtomicBool::new(false),
    });
    let store = LocalImageStore::new(PUBLIC_BASE, job.media.path().to_path_buf()).unwrap();
    let processor = ImageProcessor::new(
        fetcher,
        store,
        job.repository.clone() as Arc<dyn CandidateRepository>,
    );
    let stepper = BatchStepper::new(
        job.progress.clone(),
        job.repository.clone() as Arc<dyn CandidateRepository>,
        processor,
        300,
    );

    let report = stepper.start().await.unwrap();
    assert_eq!(report, StepReport::Stale);

    // The stale step wrote no counters.
    let state = job.progress.get().await.unwrap();
    assert_eq!(state.processed, 0);
    assert_eq!(state.succeeded, 0);
    assert_eq!(state.failed, 0);
}
