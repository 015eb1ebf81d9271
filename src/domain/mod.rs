//! Domain types for the batch image replacement job

pub mod error;
pub mod image;
pub mod job;
pub mod repositories;

pub use error::ReplaceError;
pub use image::CandidateImage;
pub use job::{JobState, JobStatePatch, JobStatus, Outcome, RunToken, StepReport, Toggled};
pub use repositories::{CandidateRepository, TransformFetcher};
