//! Per-item processing: fetch, overwrite, mark
//!
//! The outcome of one item is data for the counters, never an error to the
//! caller; any classified failure leaves the item unmarked so a later run
//! retries it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::image::CandidateImage;
use crate::domain::job::{Outcome, RunToken};
use crate::domain::repositories::{CandidateRepository, TransformFetcher};
use crate::infrastructure::storage::LocalImageStore;

pub struct ImageProcessor {
    fetcher: Arc<dyn TransformFetcher>,
    store: LocalImageStore,
    repository: Arc<dyn CandidateRepository>,
}

impl ImageProcessor {
    pub fn new(
        fetcher: Arc<dyn TransformFetcher>,
        store: LocalImageStore,
        repository: Arc<dyn CandidateRepository>,
    ) -> Self {
        Self {
            fetcher,
            store,
            repository,
        }
    }

    pub async fn process(&self, item: &CandidateImage, run: &RunToken) -> Outcome {
        // A page replayed after a crash can contain items this run already
        // finished; count them succeeded without fetching again.
        if item.processed_by(run) {
            debug!(image_id = item.id, "already processed in this run, skipping fetch");
            return Outcome::Success;
        }

        let bytes = match self.fetcher.fetch_transformed(&item.source_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(image_id = item.id, url = %item.source_url, error = %e, "transform fetch failed");
                return Outcome::Failure;
            }
        };

        if let Err(e) = self.store.overwrite(&item.source_url, &bytes).await {
            warn!(image_id = item.id, url = %item.source_url, error = %e, "storage write failed");
            return Outcome::Failure;
        }

        // Marking must land before the outcome is reported; this is what
        // makes processing at-most-once across resumed runs.
        match self.repository.mark_processed(item.id, run).await {
            Ok(()) => {
                debug!(image_id = item.id, "image replaced");
                Outcome::Success
            }
            Err(e) => {
                warn!(image_id = item.id, error = %e, "failed to persist processed marker");
                Outcome::Failure
            }
        }
    }
}
