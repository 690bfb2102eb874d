use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::SwapSource;
use crate::engine::roster_index::{normalize_date, RosterDay};
use crate::models::{
    CreateSwapRequestInput, PreferredDate, RequestStatus, Shift, ShiftType, SwapRequest,
};
use crate::{AppError, AppResult};

#[derive(Debug, sqlx::FromRow)]
struct SwapRequestRow {
    id: i32,
    requester_id: i32,
    shift_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SwapRequestRow> for SwapRequest {
    type Error = AppError;

    fn try_from(row: SwapRequestRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<RequestStatus>().map_err(|e| {
            AppError::Internal(format!("Swap request {} has an unknown status: {}", row.id, e))
        })?;
        Ok(SwapRequest {
            id: row.id,
            requester_id: row.requester_id,
            shift_id: row.shift_id,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PreferredDateRow {
    id: i32,
    request_id: i32,
    date: NaiveDate,
    accepted_types: Vec<String>,
}

impl TryFrom<PreferredDateRow> for PreferredDate {
    type Error = AppError;

    fn try_from(row: PreferredDateRow) -> Result<Self, Self::Error> {
        let accepted_types = row
            .accepted_types
            .iter()
            .map(|t| t.parse::<ShiftType>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|e| {
                AppError::Internal(format!("Preferred date {} is malformed: {}", row.id, e))
            })?;
        Ok(PreferredDate {
            id: row.id,
            request_id: row.request_id,
            date: row.date,
            accepted_types,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RosterRow {
    id: Uuid,
    worker_id: i32,
    date: NaiveDate,
}

const REQUEST_COLUMNS: &str = "id, requester_id, shift_id, status, created_at";

pub struct PgSwapSource {
    pool: PgPool,
}

impl PgSwapSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pending request for one of the worker's shifts together with
    /// its preferred dates.
    pub async fn create_swap_request(
        &self,
        worker_id: i32,
        input: &CreateSwapRequestInput,
    ) -> AppResult<SwapRequest> {
        if input.preferred_dates.is_empty() {
            return Err(AppError::BadRequest(
                "At least one preferred date is required".to_string(),
            ));
        }

        let mut preferred = Vec::with_capacity(input.preferred_dates.len());
        for p in &input.preferred_dates {
            let date = normalize_date(&p.date).map_err(AppError::BadRequest)?;
            let types: Vec<String> = p
                .accepted_types
                .iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(|t| t.as_str().to_string())
                .collect();
            preferred.push((date, types));
        }

        let owner: (i32,) = sqlx::query_as(r#"SELECT worker_id FROM "Shifts" WHERE id = $1"#)
            .bind(input.shift_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shift {} not found", input.shift_id)))?;

        if owner.0 != worker_id {
            return Err(AppError::Forbidden(
                "You can only offer your own shifts".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SwapRequestRow>(&format!(
            r#"
            INSERT INTO "SwapRequests" (requester_id, shift_id, status)
            VALUES ($1, $2, 'pending')
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(worker_id)
        .bind(input.shift_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "Shift {} already has an active swap request",
                input.shift_id
            )),
            _ => {
                tracing::error!(error = %e, worker_id, shift_id = %input.shift_id, "Failed to insert swap request");
                AppError::Database(e)
            }
        })?;

        for (date, types) in preferred {
            sqlx::query(
                r#"INSERT INTO "PreferredDates" (request_id, date, accepted_types) VALUES ($1, $2, $3)"#,
            )
            .bind(row.id)
            .bind(date)
            .bind(types)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, request_id = row.id, "Failed to commit swap request");
            AppError::Internal(format!("Failed to commit swap request {}: {}", row.id, e))
        })?;

        tracing::info!(request_id = row.id, worker_id, shift_id = %input.shift_id, "Swap request created");
        SwapRequest::try_from(row)
    }
}

#[async_trait]
impl SwapSource for PgSwapSource {
    async fn list_pending_swap_requests(&self) -> AppResult<Vec<SwapRequest>> {
        let rows = sqlx::query_as::<_, SwapRequestRow>(&format!(
            r#"
            SELECT {}
            FROM "SwapRequests"
            WHERE status = 'pending'
            ORDER BY created_at, id
            "#,
            REQUEST_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch pending swap requests");
            e
        })?;

        rows.into_iter().map(SwapRequest::try_from).collect()
    }

    async fn list_shifts(&self, ids: &[Uuid]) -> AppResult<Vec<Shift>> {
        let shifts = sqlx::query_as::<_, Shift>(
            r#"
            SELECT id, worker_id, date, start_time, end_time
            FROM "Shifts"
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(shifts)
    }

    async fn list_preferred_dates(&self, request_ids: &[i32]) -> AppResult<Vec<PreferredDate>> {
        let rows = sqlx::query_as::<_, PreferredDateRow>(
            r#"
            SELECT id, request_id, date, accepted_types
            FROM "PreferredDates"
            WHERE request_id = ANY($1)
            ORDER BY request_id, id
            "#,
        )
        .bind(request_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PreferredDate::try_from).collect()
    }

    async fn list_worker_roster_dates(
        &self,
        worker_ids: &[i32],
    ) -> AppResult<HashMap<i32, Vec<RosterDay>>> {
        let rows = sqlx::query_as::<_, RosterRow>(
            r#"
            SELECT id, worker_id, date
            FROM "Shifts"
            WHERE worker_id = ANY($1)
            "#,
        )
        .bind(worker_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut roster: HashMap<i32, Vec<RosterDay>> = HashMap::new();
        for row in rows {
            roster.entry(row.worker_id).or_default().push(RosterDay {
                shift_id: row.id,
                date: row.date,
            });
        }
        Ok(roster)
    }
}
