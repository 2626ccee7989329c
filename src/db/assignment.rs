//! Assignment rows.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::notify_change;
use crate::error::{Error, Result};
use crate::model::{Assignment, AssignmentId, BranchSelector};

const COLUMNS: &str = "id, title, description, deadline, priority, category, branch_selector, project_id, created_by, created_at, emails_sent";

impl super::Db {
    pub async fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO assignments (id, title, description, deadline, priority, category, branch_selector, project_id, created_by, created_at, emails_sent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(assignment.id.0)
        .bind(&assignment.title)
        .bind(&assignment.description)
        .bind(assignment.deadline)
        .bind(assignment.priority.to_string())
        .bind(&assignment.category)
        .bind(Json(&assignment.branch_selector))
        .bind(&assignment.project_id)
        .bind(&assignment.created_by)
        .bind(assignment.created_at)
        .bind(assignment.emails_sent)
        .execute(&mut *tx)
        .await?;

        notify_change(
            &mut tx,
            json!({"kind": "assignment_created", "id": assignment.id.0}),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Set the notification flag. Already set is a no-op.
    pub async fn mark_emails_sent(&self, id: AssignmentId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let current: Option<(bool,)> =
            sqlx::query_as("SELECT emails_sent FROM assignments WHERE id = $1 FOR UPDATE")
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await?;
        match current {
            None => return Err(Error::NotFound(format!("assignment {id}"))),
            Some((true,)) => return Ok(()),
            Some((false,)) => {}
        }

        sqlx::query("UPDATE assignments SET emails_sent = true WHERE id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        notify_change(&mut tx, json!({"kind": "assignment_updated", "id": id.0})).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete an assignment; its progress records go with it (cascade).
    pub async fn delete_assignment(&self, id: AssignmentId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let rows_affected = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if rows_affected == 0 {
            return Err(Error::NotFound(format!("assignment {id}")));
        }

        notify_change(&mut tx, json!({"kind": "assignment_removed", "id": id.0})).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_assignment(&self, id: AssignmentId) -> Result<Assignment> {
        let row: Option<AssignmentRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM assignments WHERE id = $1"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| Error::NotFound(format!("assignment {id}")))?
            .try_into_assignment()
    }
}

/// Every assignment, newest first.
pub(super) async fn all(tx: &mut Transaction<'_, Postgres>) -> Result<Vec<Assignment>> {
    let rows: Vec<AssignmentRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM assignments ORDER BY created_at DESC, id"
    ))
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter()
        .map(AssignmentRow::try_into_assignment)
        .collect()
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    deadline: Option<DateTime<Utc>>,
    priority: String,
    category: Option<String>,
    branch_selector: Json<BranchSelector>,
    project_id: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    emails_sent: bool,
}

impl AssignmentRow {
    fn try_into_assignment(self) -> Result<Assignment> {
        Ok(Assignment {
            id: AssignmentId(self.id),
            title: self.title,
            description: self.description,
            deadline: self.deadline,
            priority: self.priority.parse()?,
            category: self.category,
            branch_selector: self.branch_selector.0,
            project_id: self.project_id,
            created_by: self.created_by,
            created_at: self.created_at,
            emails_sent: self.emails_sent,
        })
    }
}
