//! Candidate image entity
//!
//! A row in the `product_images` table. The service never creates or deletes
//! these during a run; it only reads them and stamps the processed marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::RunToken;

/// One product image eligible for replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateImage {
    pub id: i64,
    /// Product the image is attached to; images without one are never candidates.
    pub product_id: Option<i64>,
    /// Public URL of the original image, also the key used to derive the
    /// transformation URL and the on-disk location.
    pub source_url: String,
    /// Run token of the run that processed this image, `None` if unprocessed.
    pub processed_run: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateImage {
    pub fn is_processed(&self) -> bool {
        self.processed_run.is_some()
    }

    /// True if this image was already processed by the given run.
    pub fn processed_by(&self, run: &RunToken) -> bool {
        self.processed_run.as_deref() == Some(run.as_str())
    }
}
