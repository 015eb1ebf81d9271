//! Durable job-state store
//!
//! Each `JobState` field is an independently addressable row in the
//! `job_state` table, so a concurrent status reader never observes a torn
//! counter. Patches are applied inside a transaction; reads tolerate missing
//! keys (a fresh install reads as all-zero, not running).

use std::sync::Arc;

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::domain::job::{JobState, JobStatePatch, RunToken};

mod keys {
    pub const RUNNING: &str = "running";
    pub const OFFSET: &str = "offset";
    pub const TOTAL: &str = "total";
    pub const PROCESSED: &str = "processed";
    pub const SUCCEEDED: &str = "succeeded";
    pub const FAILED: &str = "failed";
    pub const RUN_TOKEN: &str = "run_token";
}

#[derive(Clone)]
pub struct ProgressStore {
    pool: Arc<SqlitePool>,
}

impl ProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn get(&self) -> Result<JobState> {
        let rows = sqlx::query("SELECT key, value FROM job_state")
            .fetch_all(&*self.pool)
            .await?;

        let mut state = JobState::default();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            match key.as_str() {
                keys::RUNNING => state.running = value == "1",
                keys::OFFSET => state.offset = value.parse().unwrap_or_default(),
                keys::TOTAL => state.total = value.parse().unwrap_or_default(),
                keys::PROCESSED => state.processed = value.parse().unwrap_or_default(),
                keys::SUCCEEDED => state.succeeded = value.parse().unwrap_or_default(),
                keys::FAILED => state.failed = value.parse().unwrap_or_default(),
                keys::RUN_TOKEN => state.run_token = Some(RunToken::from(value)),
                _ => {}
            }
        }
        Ok(state)
    }

    /// Apply a field-wise patch atomically.
    pub async fn apply(&self, patch: &JobStatePatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(running) = patch.running {
            upsert(&mut tx, keys::RUNNING, if running { "1" } else { "0" }).await?;
        }
        if let Some(offset) = patch.offset {
            upsert(&mut tx, keys::OFFSET, &offset.to_string()).await?;
        }
        if let Some(total) = patch.total {
            upsert(&mut tx, keys::TOTAL, &total.to_string()).await?;
        }
        if let Some(processed) = patch.processed {
            upsert(&mut tx, keys::PROCESSED, &processed.to_string()).await?;
        }
        if let Some(succeeded) = patch.succeeded {
            upsert(&mut tx, keys::SUCCEEDED, &succeeded.to_string()).await?;
        }
        if let Some(failed) = patch.failed {
            upsert(&mut tx, keys::FAILED, &failed.to_string()).await?;
        }
        if let Some(run_token) = &patch.run_token {
            match run_token {
                Some(token) => upsert(&mut tx, keys::RUN_TOKEN, token.as_str()).await?,
                None => {
                    sqlx::query("DELETE FROM job_state WHERE key = ?")
                        .bind(keys::RUN_TOKEN)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Transition into a fresh run: total fixed, counters and offset zeroed,
    /// lease set, running flag raised.
    pub async fn reset_for_run(&self, total: u32, run: &RunToken) -> Result<()> {
        self.apply(&JobStatePatch {
            running: Some(true),
            offset: Some(0),
            total: Some(total),
            processed: Some(0),
            succeeded: Some(0),
            failed: Some(0),
            run_token: Some(Some(run.clone())),
        })
        .await
    }

    /// Wipe all persisted state back to the installed default.
    pub async fn reset(&self) -> Result<()> {
        sqlx::query("DELETE FROM job_state")
            .execute(&*self.pool)
            .await?;
        Ok(())
    }
}

async fn upsert(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    key: &str,
    value: &str,
) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO job_state (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
