//! Postgres-backed [`Store`].
//!
//! Every write runs in a transaction that also issues
//! `pg_notify(CHANGES_CHANNEL, ..)`, so listeners hear about it only once
//! it commits.

mod assignment;
mod listen;
mod progress;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{Error, Result};
use crate::model::{Assignment, AssignmentId, ProgressId, ProgressRecord};
use crate::store::{Snapshot, Store, Subscription};

/// NOTIFY channel carrying one payload per committed write.
pub const CHANGES_CHANNEL: &str = "branchtrack_changes";

/// Fallback re-read interval when notifications are missed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Database handle. Owns the connection pool.
pub struct Db {
    pool: PgPool,
    poll_interval: Duration,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Queue a change notice on `tx`. Delivered on commit.
async fn notify_change(
    tx: &mut Transaction<'_, Postgres>,
    payload: serde_json::Value,
) -> Result<()> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(CHANGES_CHANNEL)
        .bind(payload.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl Store for Db {
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        Db::insert_assignment(self, assignment).await
    }

    async fn mark_emails_sent(&self, id: AssignmentId) -> Result<()> {
        Db::mark_emails_sent(self, id).await
    }

    async fn insert_progress(&self, records: &[ProgressRecord]) -> Result<()> {
        Db::insert_progress(self, records).await
    }

    async fn update_progress(&self, record: &ProgressRecord) -> Result<()> {
        Db::update_progress(self, record).await
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<()> {
        Db::delete_assignment(self, id).await
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Assignment> {
        Db::get_assignment(self, id).await
    }

    async fn get_progress(&self, id: ProgressId) -> Result<ProgressRecord> {
        Db::get_progress(self, id).await
    }

    async fn progress_for(&self, assignment_id: AssignmentId) -> Result<Vec<ProgressRecord>> {
        Db::progress_for(self, assignment_id).await
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        Db::load_snapshot(&self.pool).await
    }

    async fn subscribe(&self) -> Result<Subscription> {
        listen::subscribe(self.pool.clone(), self.poll_interval).await
    }
}

impl Db {
    /// Read both tables in one transaction so they agree with each other.
    pub(crate) async fn load_snapshot(pool: &PgPool) -> Result<Snapshot> {
        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        let assignments = assignment::all(&mut tx).await?;
        let progress = progress::all(&mut tx).await?;
        tx.commit().await?;
        Ok(Snapshot {
            assignments,
            progress,
        })
    }
}
