//! Repository over the `product_images` table
//!
//! Candidate pages are computed fresh per call from (filter, limit, offset);
//! no cursor is held between steps, so a step after a restart re-derives the
//! same page from the persisted offset.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::image::CandidateImage;
use crate::domain::job::RunToken;
use crate::domain::repositories::CandidateRepository;

#[derive(Clone)]
pub struct ImageRepository {
    pool: Arc<SqlitePool>,
}

impl ImageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Register an image record. Used by catalog import tooling and tests;
    /// the batch job itself never creates records.
    pub async fn insert_image(&self, product_id: Option<i64>, source_url: &str) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO product_images (product_id, source_url, updated_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(product_id)
        .bind(source_url)
        .bind(Utc::now())
        .execute(&*self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<CandidateImage>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, source_url, processed_run, updated_at
            FROM product_images
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        row.map(row_to_image).transpose()
    }
}

fn row_to_image(row: sqlx::sqlite::SqliteRow) -> Result<CandidateImage> {
    Ok(CandidateImage {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        source_url: row.try_get("source_url")?,
        processed_run: row.try_get("processed_run")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl CandidateRepository for ImageRepository {
    async fn count_candidates(&self, run: Option<&RunToken>) -> Result<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt
            FROM product_images
            WHERE product_id IS NOT NULL
              AND (processed_run IS NULL OR processed_run = ?)
            "#,
        )
        .bind(run.map(RunToken::as_str))
        .fetch_one(&*self.pool)
        .await?;

        let count: i64 = row.try_get("cnt")?;
        Ok(count as u32)
    }

    async fn candidate_page(
        &self,
        run: Option<&RunToken>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CandidateImage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, source_url, processed_run, updated_at
            FROM product_images
            WHERE product_id IS NOT NULL
              AND (processed_run IS NULL OR processed_run = ?)
            ORDER BY id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(run.map(RunToken::as_str))
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter().map(row_to_image).collect()
    }

    async fn mark_processed(&self, id: i64, run: &RunToken) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE product_images
            SET processed_run = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(run.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}
