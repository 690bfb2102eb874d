pub mod pg_leave;
pub mod pg_matches;
pub mod pg_shifts;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::engine::roster_index::RosterDay;
use crate::models::{
    LeaveBlock, LeavePreference, LeaveSwapRequest, MatchStatus, PotentialMatch, PreferredDate,
    RequestStatus, Shift, SwapRequest,
};
use crate::AppResult;

pub use pg_leave::PgLeaveSource;
pub use pg_matches::{MatchTables, PgMatchStore, LEAVE_TABLES, SHIFT_TABLES};
pub use pg_shifts::PgSwapSource;

/// The lifecycle's view of a request, independent of what it offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRef {
    pub id: i32,
    pub worker_id: i32,
    pub status: RequestStatus,
}

/// Read-only snapshot loader for shift swaps.
#[async_trait]
pub trait SwapSource: Send + Sync {
    async fn list_pending_swap_requests(&self) -> AppResult<Vec<SwapRequest>>;

    async fn list_shifts(&self, ids: &[Uuid]) -> AppResult<Vec<Shift>>;

    async fn list_preferred_dates(&self, request_ids: &[i32]) -> AppResult<Vec<PreferredDate>>;

    async fn list_worker_roster_dates(
        &self,
        worker_ids: &[i32],
    ) -> AppResult<HashMap<i32, Vec<RosterDay>>>;
}

#[async_trait]
pub trait LeaveSource: Send + Sync {
    async fn list_pending_leave_requests(&self) -> AppResult<Vec<LeaveSwapRequest>>;

    async fn list_leave_blocks(&self, ids: &[i32]) -> AppResult<Vec<LeaveBlock>>;

    async fn list_leave_preferences(&self, request_ids: &[i32]) -> AppResult<Vec<LeavePreference>>;

    async fn list_worker_leave_holdings(
        &self,
        worker_ids: &[i32],
    ) -> AppResult<HashMap<i32, Vec<LeaveBlock>>>;
}

/// Write side shared by both swap kinds. Every status change is a
/// compare-and-set, so concurrent invocations cannot both win a transition.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Atomically inserts a `pending` match unless an open match already links
    /// the unordered pair. Returns `(match, created)`, or `None` when the pair
    /// is no longer insertable (a request left `pending`, vanished, both
    /// belong to one worker, or the pair was withdrawn before).
    async fn insert_match_if_absent(
        &self,
        requester_request_id: i32,
        acceptor_request_id: i32,
    ) -> AppResult<Option<(PotentialMatch, bool)>>;

    async fn find_match(&self, match_id: i32) -> AppResult<Option<PotentialMatch>>;

    /// Moves the match to `to` only if its current status is in `from`.
    async fn update_match_status(
        &self,
        match_id: i32,
        from: &[MatchStatus],
        to: MatchStatus,
    ) -> AppResult<bool>;

    async fn find_request(&self, request_id: i32) -> AppResult<Option<RequestRef>>;

    /// Moves the request to `to` only if its current status is in `from`.
    async fn update_request_status(
        &self,
        request_id: i32,
        from: &[RequestStatus],
        to: RequestStatus,
    ) -> AppResult<bool>;

    /// Accepts a pending match as one atomic step: both requests move from
    /// `pending` to `matched`, the match moves to `accepted`, and every other
    /// pending match offering the same item (shift or leave block) as either
    /// side moves to `other_accepted`. Returns the number of matches retired,
    /// or `None` with nothing written when the match is no longer pending or
    /// either request was already claimed.
    async fn accept_match(&self, match_id: i32) -> AppResult<Option<usize>>;

    /// Cancels an open match in status `from` and marks its pair as declined.
    async fn withdraw_match(&self, match_id: i32, from: MatchStatus) -> AppResult<bool>;

    /// Declined pairs among `request_ids`, each keyed lower id first.
    async fn list_withdrawn_pairs(&self, request_ids: &[i32]) -> AppResult<HashSet<(i32, i32)>>;

    async fn list_open_matches_for_request(&self, request_id: i32) -> AppResult<Vec<PotentialMatch>>;

    /// Every match touching one of the worker's requests, newest first.
    async fn list_matches_for_worker(&self, worker_id: i32) -> AppResult<Vec<PotentialMatch>>;

    /// Deletes one preference of the request; returns how many remain, or
    /// `None` if the preference did not exist.
    async fn delete_preference(&self, request_id: i32, preference_id: i32) -> AppResult<Option<usize>>;
}
