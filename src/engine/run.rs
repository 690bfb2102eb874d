use metrics::counter;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::compatibility::{ExcludingDeclined, ShiftCompatibility};
use super::events::Notifier;
use super::leave::{LeaveCompatibility, LeaveIndex, LeaveSnapshot};
use super::lifecycle::{Lifecycle, RecordOutcome};
use super::matcher::{Candidate, MatchStrategy, MatchedPair};
use super::roster_index::{RosterIndex, RosterSnapshot};
use crate::models::{RunSummary, SwapKind};
use crate::store::{LeaveSource, MatchStore, SwapSource};
use crate::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScope {
    /// Scheduled sweep over the whole pending pool.
    Global,
    /// On-demand run; only pairs involving this worker are kept.
    Worker(i32),
}

impl RunScope {
    fn trigger(&self) -> &'static str {
        match self {
            RunScope::Global => "scheduled",
            RunScope::Worker(_) => "on_demand",
        }
    }
}

pub async fn load_roster_snapshot(source: &dyn SwapSource) -> AppResult<RosterSnapshot> {
    let requests = source
        .list_pending_swap_requests()
        .await
        .map_err(|e| e.into_data_unavailable("listing pending swap requests"))?;

    let mut shift_ids: Vec<Uuid> = requests.iter().map(|r| r.shift_id).collect();
    shift_ids.sort();
    shift_ids.dedup();
    let request_ids: Vec<i32> = requests.iter().map(|r| r.id).collect();
    let worker_ids = distinct(requests.iter().map(|r| r.requester_id));

    let shifts = source
        .list_shifts(&shift_ids)
        .await
        .map_err(|e| e.into_data_unavailable("listing offered shifts"))?;
    let preferred_dates = source
        .list_preferred_dates(&request_ids)
        .await
        .map_err(|e| e.into_data_unavailable("listing preferred dates"))?;
    let roster = source
        .list_worker_roster_dates(&worker_ids)
        .await
        .map_err(|e| e.into_data_unavailable("listing worker rosters"))?;

    Ok(RosterSnapshot {
        requests,
        shifts,
        preferred_dates,
        roster,
    })
}

pub async fn load_leave_snapshot(source: &dyn LeaveSource) -> AppResult<LeaveSnapshot> {
    let requests = source
        .list_pending_leave_requests()
        .await
        .map_err(|e| e.into_data_unavailable("listing pending leave swap requests"))?;

    let block_ids = distinct(requests.iter().map(|r| r.leave_block_id));
    let request_ids: Vec<i32> = requests.iter().map(|r| r.id).collect();
    let worker_ids = distinct(requests.iter().map(|r| r.requester_id));

    let blocks = source
        .list_leave_blocks(&block_ids)
        .await
        .map_err(|e| e.into_data_unavailable("listing offered leave blocks"))?;
    let preferences = source
        .list_leave_preferences(&request_ids)
        .await
        .map_err(|e| e.into_data_unavailable("listing leave preferences"))?;
    let holdings = source
        .list_worker_leave_holdings(&worker_ids)
        .await
        .map_err(|e| e.into_data_unavailable("listing leave holdings"))?;

    Ok(LeaveSnapshot {
        requests,
        blocks,
        preferences,
        holdings,
    })
}

async fn load_declined(store: &dyn MatchStore, request_ids: &[i32]) -> AppResult<HashSet<(i32, i32)>> {
    store
        .list_withdrawn_pairs(request_ids)
        .await
        .map_err(|e| e.into_data_unavailable("listing withdrawn pairs"))
}

/// One invocation: load a snapshot, pair it, persist the pairs. Invocations
/// share no in-process state; the store's conditional insert is the only
/// serialization point between concurrent runs.
pub async fn run_shift_matching<S: MatchStrategy>(
    source: &dyn SwapSource,
    store: &dyn MatchStore,
    notifier: &dyn Notifier,
    strategy: &S,
    scope: RunScope,
) -> AppResult<RunSummary> {
    let kind = SwapKind::Shifts;
    counter!("swap_match_runs_total", "kind" => kind.as_str(), "trigger" => scope.trigger())
        .increment(1);

    let snapshot = match load_roster_snapshot(source).await {
        Ok(snapshot) => snapshot,
        Err(e) => return Err(failed(kind, scope, e)),
    };

    let request_ids: Vec<i32> = snapshot.requests.iter().map(|r| r.id).collect();
    let declined = match load_declined(store, &request_ids).await {
        Ok(declined) => declined,
        Err(e) => return Err(failed(kind, scope, e)),
    };

    let (considered, pairs) = {
        let index = RosterIndex::build(snapshot);
        let pairs = match scope {
            // Nothing of the caller's to persist; skip the pairing.
            RunScope::Worker(worker_id) if index.requests_of(worker_id).is_empty() => Vec::new(),
            _ => {
                let rule = ShiftCompatibility::new(&index);
                strategy.pair(index.entries(), &ExcludingDeclined::new(&rule, &declined))
            }
        };
        (index.entries().len(), in_scope(index.entries(), pairs, scope))
    };

    persist(kind, considered, pairs, store, notifier, strategy.name(), scope)
        .await
        .map_err(|e| failed(kind, scope, e))
}

pub async fn run_leave_matching<S: MatchStrategy>(
    source: &dyn LeaveSource,
    store: &dyn MatchStore,
    notifier: &dyn Notifier,
    strategy: &S,
    scope: RunScope,
) -> AppResult<RunSummary> {
    let kind = SwapKind::Leave;
    counter!("swap_match_runs_total", "kind" => kind.as_str(), "trigger" => scope.trigger())
        .increment(1);

    let snapshot = match load_leave_snapshot(source).await {
        Ok(snapshot) => snapshot,
        Err(e) => return Err(failed(kind, scope, e)),
    };

    let request_ids: Vec<i32> = snapshot.requests.iter().map(|r| r.id).collect();
    let declined = match load_declined(store, &request_ids).await {
        Ok(declined) => declined,
        Err(e) => return Err(failed(kind, scope, e)),
    };

    let (considered, pairs) = {
        let index = LeaveIndex::build(snapshot);
        let rule = LeaveCompatibility::new(&index);
        let pairs = strategy.pair(index.entries(), &ExcludingDeclined::new(&rule, &declined));
        (index.entries().len(), in_scope(index.entries(), pairs, scope))
    };

    persist(kind, considered, pairs, store, notifier, strategy.name(), scope)
        .await
        .map_err(|e| failed(kind, scope, e))
}

fn in_scope<C: Candidate>(pool: &[C], pairs: Vec<MatchedPair>, scope: RunScope) -> Vec<MatchedPair> {
    let RunScope::Worker(worker_id) = scope else {
        return pairs;
    };

    let owners: HashMap<i32, i32> = pool.iter().map(|c| (c.request_id(), c.worker_id())).collect();
    let owned_by = |request_id: i32| owners.get(&request_id) == Some(&worker_id);

    pairs
        .into_iter()
        .filter(|p| owned_by(p.requester_request_id) || owned_by(p.acceptor_request_id))
        .collect()
}

/// Records each pair in turn. A failure stops the run; pairs already
/// recorded stay, and the next run rediscovers the rest.
async fn persist(
    kind: SwapKind,
    considered: usize,
    pairs: Vec<MatchedPair>,
    store: &dyn MatchStore,
    notifier: &dyn Notifier,
    strategy: &'static str,
    scope: RunScope,
) -> AppResult<RunSummary> {
    let lifecycle = Lifecycle::new(kind, store, notifier);
    let mut summary = RunSummary {
        requests_considered: considered,
        matches_found: pairs.len(),
        matches_persisted: 0,
    };

    for pair in pairs {
        if let RecordOutcome::Created(_) = lifecycle.record(pair).await? {
            summary.matches_persisted += 1;
        }
    }

    counter!("swap_matches_found_total", "kind" => kind.as_str())
        .increment(summary.matches_found as u64);
    counter!("swap_matches_persisted_total", "kind" => kind.as_str())
        .increment(summary.matches_persisted as u64);

    tracing::info!(
        kind = %kind,
        trigger = scope.trigger(),
        strategy,
        requests_considered = summary.requests_considered,
        matches_found = summary.matches_found,
        matches_persisted = summary.matches_persisted,
        "Matching run finished"
    );

    Ok(summary)
}

fn failed(kind: SwapKind, scope: RunScope, e: crate::AppError) -> crate::AppError {
    counter!("swap_match_run_failures_total", "kind" => kind.as_str(), "trigger" => scope.trigger())
        .increment(1);
    tracing::error!(kind = %kind, trigger = scope.trigger(), error = %e, "Matching run aborted");
    e
}

fn distinct(ids: impl Iterator<Item = i32>) -> Vec<i32> {
    let mut ids: Vec<i32> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::recording::RecordingNotifier;
    use crate::engine::events::MatchEventType;
    use crate::engine::matcher::GreedyFirstFit;
    use crate::engine::testing::{preferred, request, shift};
    use crate::models::{
        LeaveBlock, LeavePreference, LeaveSwapRequest, MatchStatus, RequestStatus, ShiftType,
    };
    use crate::store::memory::MemoryStore;
    use crate::AppError;

    const X: i32 = 100;
    const Y: i32 = 200;
    const Z: i32 = 300;

    /// X offers 2025-06-01 07:00 wanting 06-05; Y offers 2025-06-05 15:00 wanting 06-01.
    fn simple_store(x_types: &[ShiftType]) -> MemoryStore {
        let store = MemoryStore::new(SwapKind::Shifts);
        let x = shift(X, "2025-06-01", 7);
        let y = shift(Y, "2025-06-05", 15);
        store.add_request(request(1, X, x.id, 0), vec![preferred(1, 1, "2025-06-05", x_types)]);
        store.add_request(request(2, Y, y.id, 1), vec![preferred(2, 2, "2025-06-01", &[])]);
        store.add_shift(x);
        store.add_shift(y);
        store
    }

    async fn run(store: &MemoryStore, notifier: &RecordingNotifier, scope: RunScope) -> AppResult<RunSummary> {
        run_shift_matching(store, store, notifier, &GreedyFirstFit, scope).await
    }

    #[tokio::test]
    async fn test_simple_match_persists_one_pending_match() {
        let store = simple_store(&[]);
        let notifier = RecordingNotifier::default();

        let summary = run(&store, &notifier, RunScope::Global).await.unwrap();
        assert_eq!(
            summary,
            RunSummary { requests_considered: 2, matches_found: 1, matches_persisted: 1 }
        );

        let matches = store.matches();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].status, MatchStatus::Pending);
        assert_eq!(matches[0].requester_request_id, 1);
        assert_eq!(matches[0].acceptor_request_id, 2);
        assert_eq!(notifier.types(), vec![MatchEventType::MatchCreated]);
    }

    #[tokio::test]
    async fn test_second_run_creates_nothing() {
        let store = simple_store(&[]);
        let notifier = RecordingNotifier::default();

        run(&store, &notifier, RunScope::Global).await.unwrap();
        let second = run(&store, &notifier, RunScope::Global).await.unwrap();

        assert_eq!(second.matches_found, 1);
        assert_eq!(second.matches_persisted, 0);
        assert_eq!(store.matches().len(), 1);
        assert_eq!(notifier.types().len(), 1);
    }

    #[tokio::test]
    async fn test_type_mismatch_yields_no_match() {
        let store = simple_store(&[ShiftType::Night]);
        let notifier = RecordingNotifier::default();

        let summary = run(&store, &notifier, RunScope::Global).await.unwrap();
        assert_eq!(summary.matches_found, 0);
        assert!(store.matches().is_empty());
        assert_eq!(summary.message(), "No compatible swaps found among 2 pending requests");
    }

    #[tokio::test]
    async fn test_roster_conflict_yields_no_match() {
        let store = simple_store(&[]);
        store.add_shift(shift(X, "2025-06-05", 22));
        let notifier = RecordingNotifier::default();

        let summary = run(&store, &notifier, RunScope::Global).await.unwrap();
        assert_eq!(summary.matches_found, 0);
        assert!(store.matches().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_is_data_unavailable_and_persists_nothing() {
        let store = simple_store(&[]);
        store.set_fail_reads(true);
        let notifier = RecordingNotifier::default();

        let err = run(&store, &notifier, RunScope::Global).await.unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
        assert!(store.matches().is_empty());
    }

    #[tokio::test]
    async fn test_on_demand_run_keeps_only_callers_pairs() {
        let store = simple_store(&[]);
        // A second, independent pair: Z <-> W on other dates.
        const W: i32 = 400;
        let z = shift(Z, "2025-07-01", 7);
        let w = shift(W, "2025-07-02", 7);
        store.add_request(request(3, Z, z.id, 2), vec![preferred(3, 3, "2025-07-02", &[])]);
        store.add_request(request(4, W, w.id, 3), vec![preferred(4, 4, "2025-07-01", &[])]);
        store.add_shift(z);
        store.add_shift(w);
        let notifier = RecordingNotifier::default();

        let summary = run(&store, &notifier, RunScope::Worker(Z)).await.unwrap();
        assert_eq!(
            summary,
            RunSummary { requests_considered: 4, matches_found: 1, matches_persisted: 1 }
        );
        let matches = store.matches();
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].requester_request_id, matches[0].acceptor_request_id), (3, 4));

        let global = run(&store, &notifier, RunScope::Global).await.unwrap();
        assert_eq!(global.matches_found, 2);
        assert_eq!(global.matches_persisted, 1);
    }

    #[tokio::test]
    async fn test_on_demand_run_for_worker_without_requests_persists_nothing() {
        let store = simple_store(&[]);
        let notifier = RecordingNotifier::default();

        let summary = run(&store, &notifier, RunScope::Worker(Z)).await.unwrap();
        assert_eq!(
            summary,
            RunSummary { requests_considered: 2, matches_found: 0, matches_persisted: 0 }
        );
        assert!(store.matches().is_empty());
    }

    #[tokio::test]
    async fn test_no_self_match_across_runs() {
        let store = MemoryStore::new(SwapKind::Shifts);
        let a = shift(X, "2025-06-01", 7);
        let b = shift(X, "2025-06-05", 15);
        store.add_request(request(1, X, a.id, 0), vec![preferred(1, 1, "2025-06-05", &[])]);
        store.add_request(request(2, X, b.id, 1), vec![preferred(2, 2, "2025-06-01", &[])]);
        store.add_shift(a);
        store.add_shift(b);

        let summary = run(&store, &RecordingNotifier::default(), RunScope::Global).await.unwrap();
        assert_eq!(summary.matches_found, 0);
    }

    #[tokio::test]
    async fn test_matched_requests_leave_the_pool() {
        let store = simple_store(&[]);
        let notifier = RecordingNotifier::default();
        run(&store, &notifier, RunScope::Global).await.unwrap();

        let lifecycle = Lifecycle::new(SwapKind::Shifts, &store, &notifier);
        lifecycle.accept(1, Y).await.unwrap();

        let summary = run(&store, &notifier, RunScope::Global).await.unwrap();
        assert_eq!(summary.requests_considered, 0);
        assert_eq!(summary.matches_found, 0);
    }

    #[tokio::test]
    async fn test_withdrawn_match_is_not_rediscovered() {
        let store = simple_store(&[]);
        let notifier = RecordingNotifier::default();
        run(&store, &notifier, RunScope::Global).await.unwrap();

        let lifecycle = Lifecycle::new(SwapKind::Shifts, &store, &notifier);
        lifecycle.withdraw(1, X).await.unwrap();

        let summary = run(&store, &notifier, RunScope::Global).await.unwrap();
        assert_eq!(
            summary,
            RunSummary { requests_considered: 2, matches_found: 0, matches_persisted: 0 }
        );
        let statuses: Vec<MatchStatus> = store.matches().iter().map(|m| m.status).collect();
        assert_eq!(statuses, vec![MatchStatus::Cancelled]);
    }

    #[tokio::test]
    async fn test_withdrawal_frees_requests_for_other_partners() {
        let store = simple_store(&[]);
        // Z offers the same day as Y and wants X's day too, but queues after Y.
        let z = shift(Z, "2025-06-05", 7);
        store.add_request(request(3, Z, z.id, 2), vec![preferred(3, 3, "2025-06-01", &[])]);
        store.add_shift(z);
        let notifier = RecordingNotifier::default();

        run(&store, &notifier, RunScope::Global).await.unwrap();
        let lifecycle = Lifecycle::new(SwapKind::Shifts, &store, &notifier);
        lifecycle.withdraw(1, Y).await.unwrap();

        let summary = run(&store, &notifier, RunScope::Global).await.unwrap();
        assert_eq!(summary.matches_persisted, 1);
        let latest = store.matches().into_iter().find(|m| m.status == MatchStatus::Pending).unwrap();
        assert_eq!((latest.requester_request_id, latest.acceptor_request_id), (1, 3));
    }

    #[tokio::test]
    async fn test_leave_run_uses_same_lifecycle() {
        let store = MemoryStore::new(SwapKind::Leave);
        store.add_leave_block(LeaveBlock { id: 11, worker_id: X, block_number: 2 });
        store.add_leave_block(LeaveBlock { id: 22, worker_id: Y, block_number: 5 });
        let now = chrono::Utc::now();
        store.add_leave_request(
            LeaveSwapRequest { id: 1, requester_id: X, leave_block_id: 11, status: RequestStatus::Pending, created_at: now },
            vec![LeavePreference { id: 1, request_id: 1, block_number: 5 }],
        );
        store.add_leave_request(
            LeaveSwapRequest { id: 2, requester_id: Y, leave_block_id: 22, status: RequestStatus::Pending, created_at: now },
            vec![LeavePreference { id: 2, request_id: 2, block_number: 2 }],
        );
        let notifier = RecordingNotifier::default();

        let summary = run_leave_matching(&store, &store, &notifier, &GreedyFirstFit, RunScope::Global)
            .await
            .unwrap();
        assert_eq!(summary.matches_persisted, 1);

        let again = run_leave_matching(&store, &store, &notifier, &GreedyFirstFit, RunScope::Global)
            .await
            .unwrap();
        assert_eq!(again.matches_persisted, 0);

        let lifecycle = Lifecycle::new(SwapKind::Leave, &store, &notifier);
        let accepted = lifecycle.accept(1, X).await.unwrap();
        assert_eq!(accepted.status, MatchStatus::Accepted);
        assert_eq!(store.request_status(1), Some(RequestStatus::Matched));
        assert_eq!(store.request_status(2), Some(RequestStatus::Matched));
    }
}
