use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};

use super::LeaveSource;
use crate::models::{
    CreateLeaveSwapRequestInput, LeaveBlock, LeavePreference, LeaveSwapRequest, RequestStatus,
};
use crate::{AppError, AppResult};

#[derive(Debug, sqlx::FromRow)]
struct LeaveRequestRow {
    id: i32,
    requester_id: i32,
    leave_block_id: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRequestRow> for LeaveSwapRequest {
    type Error = AppError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<RequestStatus>().map_err(|e| {
            AppError::Internal(format!("Leave swap request {} has an unknown status: {}", row.id, e))
        })?;
        Ok(LeaveSwapRequest {
            id: row.id,
            requester_id: row.requester_id,
            leave_block_id: row.leave_block_id,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LeaveBlockRow {
    id: i32,
    worker_id: i32,
    block_number: i32,
}

impl From<LeaveBlockRow> for LeaveBlock {
    fn from(row: LeaveBlockRow) -> Self {
        LeaveBlock {
            id: row.id,
            worker_id: row.worker_id,
            block_number: row.block_number,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LeavePreferenceRow {
    id: i32,
    request_id: i32,
    block_number: i32,
}

const REQUEST_COLUMNS: &str = "id, requester_id, leave_block_id, status, created_at";

pub struct PgLeaveSource {
    pool: PgPool,
}

impl PgLeaveSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_leave_request(
        &self,
        worker_id: i32,
        input: &CreateLeaveSwapRequestInput,
    ) -> AppResult<LeaveSwapRequest> {
        let wanted: BTreeSet<i32> = input.block_numbers.iter().copied().collect();
        if wanted.is_empty() {
            return Err(AppError::BadRequest(
                "At least one block number is required".to_string(),
            ));
        }

        let block = sqlx::query_as::<_, LeaveBlockRow>(
            r#"SELECT id, worker_id, block_number FROM "LeaveBlocks" WHERE id = $1"#,
        )
        .bind(input.leave_block_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Leave block {} not found", input.leave_block_id))
        })?;

        if block.worker_id != worker_id {
            return Err(AppError::Forbidden(
                "You can only offer your own leave blocks".to_string(),
            ));
        }
        if wanted.contains(&block.block_number) {
            return Err(AppError::BadRequest(format!(
                "Block {} is the one being offered",
                block.block_number
            )));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LeaveRequestRow>(&format!(
            r#"
            INSERT INTO "LeaveSwapRequests" (requester_id, leave_block_id, status)
            VALUES ($1, $2, 'pending')
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(worker_id)
        .bind(input.leave_block_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "Leave block {} already has an active swap request",
                input.leave_block_id
            )),
            _ => {
                tracing::error!(error = %e, worker_id, leave_block_id = input.leave_block_id, "Failed to insert leave swap request");
                AppError::Database(e)
            }
        })?;

        for block_number in wanted {
            sqlx::query(
                r#"INSERT INTO "LeavePreferences" (request_id, block_number) VALUES ($1, $2)"#,
            )
            .bind(row.id)
            .bind(block_number)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, request_id = row.id, "Failed to commit leave swap request");
            AppError::Internal(format!("Failed to commit leave swap request {}: {}", row.id, e))
        })?;

        tracing::info!(request_id = row.id, worker_id, leave_block_id = input.leave_block_id, "Leave swap request created");
        LeaveSwapRequest::try_from(row)
    }
}

#[async_trait]
impl LeaveSource for PgLeaveSource {
    async fn list_pending_leave_requests(&self) -> AppResult<Vec<LeaveSwapRequest>> {
        let rows = sqlx::query_as::<_, LeaveRequestRow>(&format!(
            r#"
            SELECT {}
            FROM "LeaveSwapRequests"
            WHERE status = 'pending'
            ORDER BY created_at, id
            "#,
            REQUEST_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch pending leave swap requests");
            e
        })?;

        rows.into_iter().map(LeaveSwapRequest::try_from).collect()
    }

    async fn list_leave_blocks(&self, ids: &[i32]) -> AppResult<Vec<LeaveBlock>> {
        let rows = sqlx::query_as::<_, LeaveBlockRow>(
            r#"SELECT id, worker_id, block_number FROM "LeaveBlocks" WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LeaveBlock::from).collect())
    }

    async fn list_leave_preferences(&self, request_ids: &[i32]) -> AppResult<Vec<LeavePreference>> {
        let rows = sqlx::query_as::<_, LeavePreferenceRow>(
            r#"
            SELECT id, request_id, block_number
            FROM "LeavePreferences"
            WHERE request_id = ANY($1)
            ORDER BY request_id, id
            "#,
        )
        .bind(request_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LeavePreference {
                id: row.id,
                request_id: row.request_id,
                block_number: row.block_number,
            })
            .collect())
    }

    async fn list_worker_leave_holdings(
        &self,
        worker_ids: &[i32],
    ) -> AppResult<HashMap<i32, Vec<LeaveBlock>>> {
        let rows = sqlx::query_as::<_, LeaveBlockRow>(
            r#"SELECT id, worker_id, block_number FROM "LeaveBlocks" WHERE worker_id = ANY($1)"#,
        )
        .bind(worker_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut holdings: HashMap<i32, Vec<LeaveBlock>> = HashMap::new();
        for row in rows {
            holdings.entry(row.worker_id).or_default().push(row.into());
        }
        Ok(holdings)
    }
}
