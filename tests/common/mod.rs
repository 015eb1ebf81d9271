//! Shared test harness: in-memory database, scripted transform endpoint,
//! temporary media tree.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use cdn_image_replace::application::{BatchStepper, ImageProcessor};
use cdn_image_replace::domain::{CandidateRepository, ReplaceError, TransformFetcher};
use cdn_image_replace::infrastructure::{
    DatabaseConnection, ImageRepository, LocalImageStore, ProgressStore,
};

pub const PUBLIC_BASE: &str = "https://shop.example.com/media";

pub fn source_url(i: u32) -> String {
    format!("{PUBLIC_BASE}/products/{i}.jpg")
}

/// Scripted transformation endpoint. Records every fetched source URL and
/// can be told to answer specific URLs with an empty body.
pub struct StubFetcher {
    empty_for: Mutex<HashSet<String>>,
    fetched: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            empty_for: Mutex::new(HashSet::new()),
            fetched: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_with_empty_body(&self, source_url: &str) {
        self.empty_for
            .lock()
            .unwrap()
            .insert(source_url.to_string());
    }

    pub fn clear_failures(&self) {
        self.empty_for.lock().unwrap().clear();
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransformFetcher for StubFetcher {
    async fn fetch_transformed(&self, source_url: &str) -> Result<Vec<u8>, ReplaceError> {
        self.fetched.lock().unwrap().push(source_url.to_string());
        if self.empty_for.lock().unwrap().contains(source_url) {
            return Err(ReplaceError::EmptyBody);
        }
        Ok(b"transformed-bytes".to_vec())
    }
}

pub struct TestJob {
    pub stepper: Arc<BatchStepper>,
    pub repository: Arc<ImageRepository>,
    pub progress: ProgressStore,
    pub fetcher: Arc<StubFetcher>,
    pub media: TempDir,
    pub pool: SqlitePool,
    batch_size: u32,
}

impl TestJob {
    /// Fresh job over `image_count` product images, all fetchable.
    pub async fn with_images(batch_size: u32, image_count: u32) -> Self {
        let db = DatabaseConnection::new("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool().clone();

        let repository = Arc::new(ImageRepository::new(pool.clone()));
        for i in 0..image_count {
            repository
                .insert_image(Some(i64::from(i % 50) + 1), &source_url(i))
                .await
                .unwrap();
        }

        let fetcher = StubFetcher::new();
        let media = tempfile::tempdir().unwrap();
        let stepper = build_stepper(&pool, &repository, &fetcher, &media, batch_size);

        Self {
            stepper,
            repository,
            progress: ProgressStore::new(pool.clone()),
            fetcher,
            media,
            pool,
            batch_size,
        }
    }

    /// A new stepper and fetcher over the same database and media tree,
    /// as after a process restart between steps.
    pub fn restart(&self) -> (Arc<BatchStepper>, Arc<StubFetcher>) {
        let fetcher = StubFetcher::new();
        let stepper = build_stepper(
            &self.pool,
            &self.repository,
            &fetcher,
            &self.media,
            self.batch_size,
        );
        (stepper, fetcher)
    }
}

fn build_stepper(
    pool: &SqlitePool,
    repository: &Arc<ImageRepository>,
    fetcher: &Arc<StubFetcher>,
    media: &TempDir,
    batch_size: u32,
) -> Arc<BatchStepper> {
    let store = LocalImageStore::new(PUBLIC_BASE, media.path().to_path_buf()).unwrap();
    let processor = ImageProcessor::new(
        fetcher.clone() as Arc<dyn TransformFetcher>,
        store,
        repository.clone() as Arc<dyn CandidateRepository>,
    );
    Arc::new(BatchStepper::new(
        ProgressStore::new(pool.clone()),
        repository.clone() as Arc<dyn CandidateRepository>,
        processor,
        batch_size,
    ))
}
