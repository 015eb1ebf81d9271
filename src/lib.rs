//! Batch product image replacement service
//!
//! Walks the product image catalog in fixed-size pages, fetches a
//! CDN-transformed rendition of each image, overwrites the stored original
//! and tracks per-item success and failure. Runs are started and stopped
//! over an authenticated HTTP control surface and stepped by an in-process
//! scheduler; all job state is persisted so a run resumes across restarts.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod server;
