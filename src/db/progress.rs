//! Progress record rows.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::notify_change;
use crate::error::{Error, Result};
use crate::model::{AssignmentId, BranchCode, ProgressId, ProgressRecord};

const COLUMNS: &str = "id, assignment_id, branch_code, branch_code_numeric, status, completion_date, remarks, follow_ups, last_follow_up, created_at, updated_at";

impl super::Db {
    /// Insert a fan-out batch in one transaction. All or nothing.
    pub async fn insert_progress(&self, records: &[ProgressRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        let mut insert = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO progress_records ({COLUMNS}, position) "
        ));
        // `position` keeps fan-out order; the batch shares one created_at.
        insert.push_values(records.iter().enumerate(), |mut row, (position, record)| {
            let (code, numeric) = record.branch_code.to_parts();
            row.push_bind(record.id.0)
                .push_bind(record.assignment_id.0)
                .push_bind(code)
                .push_bind(numeric)
                .push_bind(record.status().to_string())
                .push_bind(record.completion_date())
                .push_bind(record.remarks.clone())
                .push_bind(record.follow_ups() as i32)
                .push_bind(record.last_follow_up())
                .push_bind(record.created_at)
                .push_bind(record.updated_at)
                .push_bind(position as i32);
        });
        insert.build().execute(&mut *tx).await?;

        notify_change(
            &mut tx,
            json!({
                "kind": "progress_created",
                "assignment_id": first.assignment_id.0,
                "count": records.len(),
            }),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Overwrite the mutable fields of one record. Last write wins.
    pub async fn update_progress(&self, record: &ProgressRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let rows_affected = sqlx::query(
            "UPDATE progress_records SET status = $1, completion_date = $2, remarks = $3, follow_ups = $4, last_follow_up = $5, updated_at = $6
             WHERE id = $7",
        )
        .bind(record.status().to_string())
        .bind(record.completion_date())
        .bind(&record.remarks)
        .bind(record.follow_ups() as i32)
        .bind(record.last_follow_up())
        .bind(record.updated_at)
        .bind(record.id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("progress record {}", record.id)));
        }

        notify_change(
            &mut tx,
            json!({"kind": "progress_updated", "id": record.id.0}),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_progress(&self, id: ProgressId) -> Result<ProgressRecord> {
        let row: Option<ProgressRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM progress_records WHERE id = $1"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| Error::NotFound(format!("progress record {id}")))?
            .try_into_record()
    }

    /// Records of one assignment, in fan-out order.
    pub async fn progress_for(&self, assignment_id: AssignmentId) -> Result<Vec<ProgressRecord>> {
        let rows: Vec<ProgressRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM progress_records WHERE assignment_id = $1 ORDER BY position, id"
        ))
        .bind(assignment_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProgressRow::try_into_record).collect()
    }
}

pub(super) async fn all(tx: &mut Transaction<'_, Postgres>) -> Result<Vec<ProgressRecord>> {
    let rows: Vec<ProgressRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM progress_records ORDER BY created_at, assignment_id, position"
    ))
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter().map(ProgressRow::try_into_record).collect()
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ProgressRow {
    id: Uuid,
    assignment_id: Uuid,
    branch_code: String,
    branch_code_numeric: bool,
    status: String,
    completion_date: Option<DateTime<Utc>>,
    remarks: Option<String>,
    follow_ups: i32,
    last_follow_up: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProgressRow {
    fn try_into_record(self) -> Result<ProgressRecord> {
        ProgressRecord::from_stored(
            ProgressId(self.id),
            AssignmentId(self.assignment_id),
            BranchCode::from_parts(self.branch_code, self.branch_code_numeric),
            self.status.parse()?,
            self.completion_date,
            self.remarks,
            self.follow_ups as u32,
            self.last_follow_up,
            self.created_at,
            self.updated_at,
        )
    }
}
