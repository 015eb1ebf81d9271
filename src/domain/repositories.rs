//! Interfaces to the external collaborators of the batch job
//!
//! The record store holding candidates and the remote transformation endpoint
//! are both outside the core; these traits are the seams the stepper and the
//! processor depend on.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::error::ReplaceError;
use crate::domain::image::CandidateImage;
use crate::domain::job::RunToken;

/// Candidate selection and tagging against the record store.
///
/// The candidate filter is "attached to a product AND (unprocessed OR
/// processed by the given run)". Pinning the filter to the current run keeps
/// offset pagination stable while the run itself marks items; a later run
/// (different token) no longer sees them.
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn count_candidates(&self, run: Option<&RunToken>) -> Result<u32>;

    /// One page of candidates ordered by id ascending.
    async fn candidate_page(
        &self,
        run: Option<&RunToken>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CandidateImage>>;

    /// Stamp the processed marker with the run that did the work.
    async fn mark_processed(&self, id: i64, run: &RunToken) -> Result<()>;
}

/// Fetches the transformed bytes for an image's source URL.
#[async_trait]
pub trait TransformFetcher: Send + Sync {
    async fn fetch_transformed(&self, source_url: &str) -> Result<Vec<u8>, ReplaceError>;
}
