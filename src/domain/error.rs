//! Per-item error taxonomy for the replacement pipeline
//!
//! These classify a single item's failure; they are folded into the failure
//! counter by the processor and never abort a batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplaceError {
    /// Network-level failure talking to the transformation endpoint
    #[error("transform fetch failed: {0}")]
    Http(String),

    /// Transformation endpoint answered with a non-success status
    #[error("transform endpoint returned HTTP {0}")]
    BadStatus(u16),

    /// Transformation endpoint answered 2xx with no body
    #[error("transform endpoint returned an empty body")]
    EmptyBody,

    /// Local storage write failed
    #[error("storage write failed: {0}")]
    Storage(String),

    /// The source URL does not map inside the configured storage root
    #[error("source url {0} resolves outside the storage root")]
    PathOutsideRoot(String),
}
