use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;

use super::{MatchStore, RequestRef};
use crate::models::{MatchStatus, PotentialMatch, RequestStatus};
use crate::{AppError, AppResult};

/// Table layout of one swap kind. Shift and leave swaps share every
/// statement and differ only in names.
#[derive(Debug)]
pub struct MatchTables {
    pub requests: &'static str,
    pub matches: &'static str,
    /// Column on `requests` naming the offered item.
    pub item_column: &'static str,
    pub preferences: &'static str,
}

pub static SHIFT_TABLES: MatchTables = MatchTables {
    requests: "SwapRequests",
    matches: "PotentialMatches",
    item_column: "shift_id",
    preferences: "PreferredDates",
};

pub static LEAVE_TABLES: MatchTables = MatchTables {
    requests: "LeaveSwapRequests",
    matches: "LeaveSwapMatches",
    item_column: "leave_block_id",
    preferences: "LeavePreferences",
};

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    id: i32,
    requester_request_id: i32,
    acceptor_request_id: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for PotentialMatch {
    type Error = AppError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<MatchStatus>().map_err(|e| {
            tracing::error!(match_id = row.id, error = %e, "Stored match has an unknown status");
            AppError::Internal(format!("Match {} has an unknown status: {}", row.id, e))
        })?;
        Ok(PotentialMatch {
            id: row.id,
            requester_request_id: row.requester_request_id,
            acceptor_request_id: row.acceptor_request_id,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: i32,
    requester_id: i32,
    status: String,
}

impl TryFrom<RequestRow> for RequestRef {
    type Error = AppError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<RequestStatus>().map_err(|e| {
            AppError::Internal(format!("Request {} has an unknown status: {}", row.id, e))
        })?;
        Ok(RequestRef {
            id: row.id,
            worker_id: row.requester_id,
            status,
        })
    }
}

const MATCH_COLUMNS: &str = "id, requester_request_id, acceptor_request_id, status, created_at";

fn into_matches(rows: Vec<MatchRow>) -> AppResult<Vec<PotentialMatch>> {
    rows.into_iter().map(PotentialMatch::try_from).collect()
}

fn status_list<S: Copy>(statuses: &[S], as_str: fn(&S) -> &'static str) -> Vec<String> {
    statuses.iter().map(|s| as_str(s).to_string()).collect()
}

pub struct PgMatchStore {
    pool: PgPool,
    tables: &'static MatchTables,
}

impl PgMatchStore {
    pub fn new(pool: PgPool, tables: &'static MatchTables) -> Self {
        Self { pool, tables }
    }

    async fn find_open_pair(&self, a: i32, b: i32) -> AppResult<Option<PotentialMatch>> {
        let sql = format!(
            r#"
            SELECT {cols}
            FROM "{matches}"
            WHERE LEAST(requester_request_id, acceptor_request_id) = LEAST($1::int, $2::int)
              AND GREATEST(requester_request_id, acceptor_request_id) = GREATEST($1::int, $2::int)
              AND status IN ('pending', 'accepted')
            "#,
            cols = MATCH_COLUMNS,
            matches = self.tables.matches,
        );

        sqlx::query_as::<_, MatchRow>(&sql)
            .bind(a)
            .bind(b)
            .fetch_optional(&self.pool)
            .await?
            .map(PotentialMatch::try_from)
            .transpose()
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn insert_match_if_absent(
        &self,
        requester_request_id: i32,
        acceptor_request_id: i32,
    ) -> AppResult<Option<(PotentialMatch, bool)>> {
        // Both requests must still be pending at write time; the partial unique
        // index on the unordered pair resolves concurrent inserts.
        let sql = format!(
            r#"
            INSERT INTO "{matches}" (requester_request_id, acceptor_request_id, status)
            SELECT a.id, b.id, 'pending'
            FROM "{requests}" a
            JOIN "{requests}" b ON b.id = $2
            WHERE a.id = $1
              AND a.status = 'pending'
              AND b.status = 'pending'
              AND a.requester_id <> b.requester_id
              AND NOT EXISTS (
                  SELECT 1 FROM "{matches}" w
                  WHERE w.withdrawn
                    AND LEAST(w.requester_request_id, w.acceptor_request_id) = LEAST(a.id, b.id)
                    AND GREATEST(w.requester_request_id, w.acceptor_request_id) = GREATEST(a.id, b.id)
              )
            ON CONFLICT ((LEAST(requester_request_id, acceptor_request_id)), (GREATEST(requester_request_id, acceptor_request_id)))
                WHERE status IN ('pending', 'accepted')
                DO NOTHING
            RETURNING {cols}
            "#,
            matches = self.tables.matches,
            requests = self.tables.requests,
            cols = MATCH_COLUMNS,
        );

        let inserted = match sqlx::query_as::<_, MatchRow>(&sql)
            .bind(requester_request_id)
            .bind(acceptor_request_id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row,
            // A concurrent insert of the same pair won; same outcome as DO NOTHING.
            Err(e) if e.as_database_error().is_some_and(|db| db.is_unique_violation()) => None,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    requester_request_id,
                    acceptor_request_id,
                    table = self.tables.matches,
                    "Failed to insert potential match"
                );
                return Err(e.into());
            }
        };

        if let Some(row) = inserted {
            return Ok(Some((PotentialMatch::try_from(row)?, true)));
        }

        // Already linked, declined, or a request left `pending`.
        Ok(self
            .find_open_pair(requester_request_id, acceptor_request_id)
            .await?
            .map(|m| (m, false)))
    }

    async fn find_match(&self, match_id: i32) -> AppResult<Option<PotentialMatch>> {
        let sql = format!(
            r#"SELECT {cols} FROM "{matches}" WHERE id = $1"#,
            cols = MATCH_COLUMNS,
            matches = self.tables.matches,
        );

        sqlx::query_as::<_, MatchRow>(&sql)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?
            .map(PotentialMatch::try_from)
            .transpose()
    }

    async fn update_match_status(
        &self,
        match_id: i32,
        from: &[MatchStatus],
        to: MatchStatus,
    ) -> AppResult<bool> {
        let sql = format!(
            r#"UPDATE "{matches}" SET status = $1, updated_at = NOW() WHERE id = $2 AND status = ANY($3)"#,
            matches = self.tables.matches,
        );

        let result = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(match_id)
            .bind(status_list(from, MatchStatus::as_str))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, match_id, to = to.as_str(), "Failed to update match status");
                e
            })?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_request(&self, request_id: i32) -> AppResult<Option<RequestRef>> {
        let sql = format!(
            r#"SELECT id, requester_id, status FROM "{requests}" WHERE id = $1"#,
            requests = self.tables.requests,
        );

        sqlx::query_as::<_, RequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?
            .map(RequestRef::try_from)
            .transpose()
    }

    async fn update_request_status(
        &self,
        request_id: i32,
        from: &[RequestStatus],
        to: RequestStatus,
    ) -> AppResult<bool> {
        let sql = format!(
            r#"UPDATE "{requests}" SET status = $1, updated_at = NOW() WHERE id = $2 AND status = ANY($3)"#,
            requests = self.tables.requests,
        );

        let result = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(request_id)
            .bind(status_list(from, RequestStatus::as_str))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, request_id, to = to.as_str(), "Failed to update request status");
                e
            })?;

        Ok(result.rows_affected() == 1)
    }

    async fn accept_match(&self, match_id: i32) -> AppResult<Option<usize>> {
        let mut tx = self.pool.begin().await?;

        let pair: Option<(i32, i32)> = sqlx::query_as(&format!(
            r#"SELECT requester_request_id, acceptor_request_id FROM "{matches}" WHERE id = $1"#,
            matches = self.tables.matches,
        ))
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((a, b)) = pair else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Request rows are locked in id order so competing accepts queue up
        // behind one another instead of deadlocking.
        let claimable: Vec<(i32, String)> = sqlx::query_as(&format!(
            r#"SELECT id, status FROM "{requests}" WHERE id IN ($1, $2) ORDER BY id FOR UPDATE"#,
            requests = self.tables.requests,
        ))
        .bind(a)
        .bind(b)
        .fetch_all(&mut *tx)
        .await?;
        if claimable.len() != 2 || claimable.iter().any(|(_, status)| status != "pending") {
            tx.rollback().await?;
            return Ok(None);
        }

        let accepted = sqlx::query(&format!(
            r#"UPDATE "{matches}" SET status = 'accepted', updated_at = NOW() WHERE id = $1 AND status = 'pending'"#,
            matches = self.tables.matches,
        ))
        .bind(match_id)
        .execute(&mut *tx)
        .await?;
        if accepted.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(&format!(
            r#"UPDATE "{requests}" SET status = 'matched', updated_at = NOW() WHERE id IN ($1, $2)"#,
            requests = self.tables.requests,
        ))
        .bind(a)
        .bind(b)
        .execute(&mut *tx)
        .await?;

        let retired = sqlx::query(&format!(
            r#"
            UPDATE "{matches}" m
            SET status = 'other_accepted', updated_at = NOW()
            WHERE m.id <> $1
              AND m.status = 'pending'
              AND EXISTS (
                  SELECT 1
                  FROM "{requests}" r
                  WHERE r.id IN (m.requester_request_id, m.acceptor_request_id)
                    AND r.{item} IN (SELECT {item} FROM "{requests}" WHERE id IN ($2, $3))
              )
            "#,
            item = self.tables.item_column,
            matches = self.tables.matches,
            requests = self.tables.requests,
        ))
        .bind(match_id)
        .bind(a)
        .bind(b)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, match_id, table = self.tables.matches, "Failed to commit match acceptance");
            AppError::Internal(format!("Failed to commit acceptance of match {}: {}", match_id, e))
        })?;

        Ok(Some(retired.rows_affected() as usize))
    }

    async fn withdraw_match(&self, match_id: i32, from: MatchStatus) -> AppResult<bool> {
        let sql = format!(
            r#"UPDATE "{matches}" SET status = 'cancelled', withdrawn = TRUE, updated_at = NOW() WHERE id = $1 AND status = $2"#,
            matches = self.tables.matches,
        );

        let result = sqlx::query(&sql)
            .bind(match_id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, match_id, "Failed to withdraw match");
                e
            })?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_withdrawn_pairs(&self, request_ids: &[i32]) -> AppResult<HashSet<(i32, i32)>> {
        let sql = format!(
            r#"
            SELECT DISTINCT
                LEAST(requester_request_id, acceptor_request_id),
                GREATEST(requester_request_id, acceptor_request_id)
            FROM "{matches}"
            WHERE withdrawn
              AND requester_request_id = ANY($1)
              AND acceptor_request_id = ANY($1)
            "#,
            matches = self.tables.matches,
        );

        let rows: Vec<(i32, i32)> = sqlx::query_as(&sql)
            .bind(request_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn list_open_matches_for_request(&self, request_id: i32) -> AppResult<Vec<PotentialMatch>> {
        let sql = format!(
            r#"
            SELECT {cols}
            FROM "{matches}"
            WHERE $1 IN (requester_request_id, acceptor_request_id)
              AND status IN ('pending', 'accepted')
            ORDER BY id
            "#,
            cols = MATCH_COLUMNS,
            matches = self.tables.matches,
        );

        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(request_id)
            .fetch_all(&self.pool)
            .await?;
        into_matches(rows)
    }

    async fn list_matches_for_worker(&self, worker_id: i32) -> AppResult<Vec<PotentialMatch>> {
        let sql = format!(
            r#"
            SELECT DISTINCT m.id, m.requester_request_id, m.acceptor_request_id, m.status, m.created_at
            FROM "{matches}" m
            JOIN "{requests}" r ON r.id IN (m.requester_request_id, m.acceptor_request_id)
            WHERE r.requester_id = $1
            ORDER BY m.id DESC
            "#,
            matches = self.tables.matches,
            requests = self.tables.requests,
        );

        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(worker_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, worker_id, "Failed to fetch worker's matches");
                e
            })?;
        into_matches(rows)
    }

    async fn delete_preference(&self, request_id: i32, preference_id: i32) -> AppResult<Option<usize>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(&format!(
            r#"DELETE FROM "{prefs}" WHERE id = $1 AND request_id = $2"#,
            prefs = self.tables.preferences,
        ))
        .bind(preference_id)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let (remaining,): (i64,) = sqlx::query_as(&format!(
            r#"SELECT COUNT(*) FROM "{prefs}" WHERE request_id = $1"#,
            prefs = self.tables.preferences,
        ))
        .bind(request_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, request_id, preference_id, "Failed to commit preference deletion");
            AppError::Internal(format!(
                "Failed to commit preference deletion for request {}: {}",
                request_id, e
            ))
        })?;

        Ok(Some(remaining.max(0) as usize))
    }
}
