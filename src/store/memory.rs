use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use super::{LeaveSource, MatchStore, RequestRef, SwapSource};
use crate::engine::roster_index::RosterDay;
use crate::models::{
    LeaveBlock, LeavePreference, LeaveSwapRequest, MatchStatus, PotentialMatch, PreferredDate,
    RequestStatus, Shift, SwapKind, SwapRequest,
};
use crate::{AppError, AppResult};

#[derive(Default)]
struct State {
    shifts: Vec<Shift>,
    requests: Vec<SwapRequest>,
    preferred_dates: Vec<PreferredDate>,
    leave_blocks: Vec<LeaveBlock>,
    leave_requests: Vec<LeaveSwapRequest>,
    leave_preferences: Vec<LeavePreference>,
    matches: Vec<PotentialMatch>,
    withdrawn: HashSet<i32>,
    next_match_id: i32,
    fail_reads: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Shift(Uuid),
    Block(i32),
}

/// In-process store for tests. Behaves as the match store of `kind` and
/// serves both sources regardless. Each call takes the lock once, which
/// gives the same atomic check-and-set behaviour as the Postgres statements.
pub struct MemoryStore {
    kind: SwapKind,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(kind: SwapKind) -> Self {
        Self {
            kind,
            state: Mutex::new(State {
                next_match_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn add_shift(&self, shift: Shift) {
        self.state.lock().unwrap().shifts.push(shift);
    }

    pub fn add_request(&self, request: SwapRequest, preferred: Vec<PreferredDate>) {
        let mut st = self.state.lock().unwrap();
        st.requests.push(request);
        st.preferred_dates.extend(preferred);
    }

    pub fn add_leave_block(&self, block: LeaveBlock) {
        self.state.lock().unwrap().leave_blocks.push(block);
    }

    pub fn add_leave_request(&self, request: LeaveSwapRequest, preferences: Vec<LeavePreference>) {
        let mut st = self.state.lock().unwrap();
        st.leave_requests.push(request);
        st.leave_preferences.extend(preferences);
    }

    /// Seeds a match directly, bypassing the open-pair check.
    pub fn seed_match(&self, requester: i32, acceptor: i32, status: MatchStatus) -> i32 {
        let mut st = self.state.lock().unwrap();
        let id = st.next_match_id;
        st.next_match_id += 1;
        st.matches.push(PotentialMatch {
            id,
            requester_request_id: requester,
            acceptor_request_id: acceptor,
            status,
            created_at: Utc::now(),
        });
        id
    }

    pub fn matches(&self) -> Vec<PotentialMatch> {
        self.state.lock().unwrap().matches.clone()
    }

    pub fn match_status(&self, match_id: i32) -> Option<MatchStatus> {
        self.state
            .lock()
            .unwrap()
            .matches
            .iter()
            .find(|m| m.id == match_id)
            .map(|m| m.status)
    }

    pub fn request_status(&self, request_id: i32) -> Option<RequestStatus> {
        let st = self.state.lock().unwrap();
        self.request_in(&st, request_id).map(|r| r.status)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    fn check_reads(st: &State) -> AppResult<()> {
        if st.fail_reads {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn request_in(&self, st: &State, request_id: i32) -> Option<RequestRef> {
        match self.kind {
            SwapKind::Shifts => st.requests.iter().find(|r| r.id == request_id).map(|r| RequestRef {
                id: r.id,
                worker_id: r.requester_id,
                status: r.status,
            }),
            SwapKind::Leave => st
                .leave_requests
                .iter()
                .find(|r| r.id == request_id)
                .map(|r| RequestRef {
                    id: r.id,
                    worker_id: r.requester_id,
                    status: r.status,
                }),
        }
    }

    fn item_of(&self, st: &State, request_id: i32) -> Option<Item> {
        match self.kind {
            SwapKind::Shifts => st
                .requests
                .iter()
                .find(|r| r.id == request_id)
                .map(|r| Item::Shift(r.shift_id)),
            SwapKind::Leave => st
                .leave_requests
                .iter()
                .find(|r| r.id == request_id)
                .map(|r| Item::Block(r.leave_block_id)),
        }
    }

    fn set_request_status(&self, st: &mut State, request_id: i32, to: RequestStatus) {
        match self.kind {
            SwapKind::Shifts => {
                if let Some(r) = st.requests.iter_mut().find(|r| r.id == request_id) {
                    r.status = to;
                }
            }
            SwapKind::Leave => {
                if let Some(r) = st.leave_requests.iter_mut().find(|r| r.id == request_id) {
                    r.status = to;
                }
            }
        }
    }
}

fn same_pair(m: &PotentialMatch, a: i32, b: i32) -> bool {
    (m.requester_request_id == a && m.acceptor_request_id == b)
        || (m.requester_request_id == b && m.acceptor_request_id == a)
}

#[async_trait]
impl SwapSource for MemoryStore {
    async fn list_pending_swap_requests(&self) -> AppResult<Vec<SwapRequest>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        Ok(st
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_shifts(&self, ids: &[Uuid]) -> AppResult<Vec<Shift>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        Ok(st.shifts.iter().filter(|s| ids.contains(&s.id)).cloned().collect())
    }

    async fn list_preferred_dates(&self, request_ids: &[i32]) -> AppResult<Vec<PreferredDate>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        Ok(st
            .preferred_dates
            .iter()
            .filter(|p| request_ids.contains(&p.request_id))
            .cloned()
            .collect())
    }

    async fn list_worker_roster_dates(
        &self,
        worker_ids: &[i32],
    ) -> AppResult<HashMap<i32, Vec<RosterDay>>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        let mut roster: HashMap<i32, Vec<RosterDay>> = HashMap::new();
        for shift in st.shifts.iter().filter(|s| worker_ids.contains(&s.worker_id)) {
            roster.entry(shift.worker_id).or_default().push(RosterDay {
                shift_id: shift.id,
                date: shift.date,
            });
        }
        Ok(roster)
    }
}

#[async_trait]
impl LeaveSource for MemoryStore {
    async fn list_pending_leave_requests(&self) -> AppResult<Vec<LeaveSwapRequest>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        Ok(st
            .leave_requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_leave_blocks(&self, ids: &[i32]) -> AppResult<Vec<LeaveBlock>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        Ok(st.leave_blocks.iter().filter(|b| ids.contains(&b.id)).cloned().collect())
    }

    async fn list_leave_preferences(&self, request_ids: &[i32]) -> AppResult<Vec<LeavePreference>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        Ok(st
            .leave_preferences
            .iter()
            .filter(|p| request_ids.contains(&p.request_id))
            .cloned()
            .collect())
    }

    async fn list_worker_leave_holdings(
        &self,
        worker_ids: &[i32],
    ) -> AppResult<HashMap<i32, Vec<LeaveBlock>>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        let mut holdings: HashMap<i32, Vec<LeaveBlock>> = HashMap::new();
        for block in st.leave_blocks.iter().filter(|b| worker_ids.contains(&b.worker_id)) {
            holdings.entry(block.worker_id).or_default().push(block.clone());
        }
        Ok(holdings)
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn insert_match_if_absent(
        &self,
        requester_request_id: i32,
        acceptor_request_id: i32,
    ) -> AppResult<Option<(PotentialMatch, bool)>> {
        let mut st = self.state.lock().unwrap();

        if let Some(existing) = st.matches.iter().find(|m| {
            m.status.is_open() && same_pair(m, requester_request_id, acceptor_request_id)
        }) {
            return Ok(Some((existing.clone(), false)));
        }

        if st.matches.iter().any(|m| {
            st.withdrawn.contains(&m.id) && same_pair(m, requester_request_id, acceptor_request_id)
        }) {
            return Ok(None);
        }

        let (Some(a), Some(b)) = (
            self.request_in(&st, requester_request_id),
            self.request_in(&st, acceptor_request_id),
        ) else {
            return Ok(None);
        };
        if a.status != RequestStatus::Pending
            || b.status != RequestStatus::Pending
            || a.worker_id == b.worker_id
        {
            return Ok(None);
        }

        let id = st.next_match_id;
        st.next_match_id += 1;
        let created = PotentialMatch {
            id,
            requester_request_id,
            acceptor_request_id,
            status: MatchStatus::Pending,
            created_at: Utc::now(),
        };
        st.matches.push(created.clone());
        Ok(Some((created, true)))
    }

    async fn find_match(&self, match_id: i32) -> AppResult<Option<PotentialMatch>> {
        let st = self.state.lock().unwrap();
        Ok(st.matches.iter().find(|m| m.id == match_id).cloned())
    }

    async fn update_match_status(
        &self,
        match_id: i32,
        from: &[MatchStatus],
        to: MatchStatus,
    ) -> AppResult<bool> {
        let mut st = self.state.lock().unwrap();
        match st.matches.iter_mut().find(|m| m.id == match_id) {
            Some(m) if from.contains(&m.status) => {
                m.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_request(&self, request_id: i32) -> AppResult<Option<RequestRef>> {
        let st = self.state.lock().unwrap();
        Ok(self.request_in(&st, request_id))
    }

    async fn update_request_status(
        &self,
        request_id: i32,
        from: &[RequestStatus],
        to: RequestStatus,
    ) -> AppResult<bool> {
        let mut st = self.state.lock().unwrap();
        match self.request_in(&st, request_id) {
            Some(r) if from.contains(&r.status) => {
                self.set_request_status(&mut st, request_id, to);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn accept_match(&self, match_id: i32) -> AppResult<Option<usize>> {
        let mut st = self.state.lock().unwrap();
        let Some(target) = st
            .matches
            .iter()
            .find(|m| m.id == match_id && m.status == MatchStatus::Pending)
            .cloned()
        else {
            return Ok(None);
        };

        let ids = target.request_ids();
        let claimable = ids.iter().all(|id| {
            self.request_in(&st, *id)
                .is_some_and(|r| r.status == RequestStatus::Pending)
        });
        if !claimable {
            return Ok(None);
        }

        let items: Vec<Item> = ids.iter().filter_map(|id| self.item_of(&st, *id)).collect();
        let competing: Vec<i32> = st
            .matches
            .iter()
            .filter(|m| m.id != match_id && m.status == MatchStatus::Pending)
            .filter(|m| {
                m.request_ids()
                    .iter()
                    .filter_map(|id| self.item_of(&st, *id))
                    .any(|item| items.contains(&item))
            })
            .map(|m| m.id)
            .collect();

        for id in ids {
            self.set_request_status(&mut st, id, RequestStatus::Matched);
        }
        for m in st.matches.iter_mut() {
            if m.id == match_id {
                m.status = MatchStatus::Accepted;
            } else if competing.contains(&m.id) {
                m.status = MatchStatus::OtherAccepted;
            }
        }
        Ok(Some(competing.len()))
    }

    async fn withdraw_match(&self, match_id: i32, from: MatchStatus) -> AppResult<bool> {
        let mut guard = self.state.lock().unwrap();
        let st = &mut *guard;
        match st.matches.iter_mut().find(|m| m.id == match_id) {
            Some(m) if m.status == from => {
                m.status = MatchStatus::Cancelled;
                st.withdrawn.insert(match_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_withdrawn_pairs(&self, request_ids: &[i32]) -> AppResult<HashSet<(i32, i32)>> {
        let st = self.state.lock().unwrap();
        Self::check_reads(&st)?;
        Ok(st
            .matches
            .iter()
            .filter(|m| st.withdrawn.contains(&m.id))
            .filter(|m| m.request_ids().iter().all(|id| request_ids.contains(id)))
            .map(|m| {
                let (a, b) = (m.requester_request_id, m.acceptor_request_id);
                (a.min(b), a.max(b))
            })
            .collect())
    }

    async fn list_open_matches_for_request(&self, request_id: i32) -> AppResult<Vec<PotentialMatch>> {
        let st = self.state.lock().unwrap();
        Ok(st
            .matches
            .iter()
            .filter(|m| m.status.is_open() && m.involves(request_id))
            .cloned()
            .collect())
    }

    async fn list_matches_for_worker(&self, worker_id: i32) -> AppResult<Vec<PotentialMatch>> {
        let st = self.state.lock().unwrap();
        let mut found: Vec<PotentialMatch> = st
            .matches
            .iter()
            .filter(|m| {
                m.request_ids().iter().any(|id| {
                    self.request_in(&st, *id)
                        .is_some_and(|r| r.worker_id == worker_id)
                })
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(found)
    }

    async fn delete_preference(&self, request_id: i32, preference_id: i32) -> AppResult<Option<usize>> {
        let mut st = self.state.lock().unwrap();
        match self.kind {
            SwapKind::Shifts => {
                let before = st.preferred_dates.len();
                st.preferred_dates
                    .retain(|p| !(p.id == preference_id && p.request_id == request_id));
                if st.preferred_dates.len() == before {
                    return Ok(None);
                }
                Ok(Some(
                    st.preferred_dates.iter().filter(|p| p.request_id == request_id).count(),
                ))
            }
            SwapKind::Leave => {
                let before = st.leave_preferences.len();
                st.leave_preferences
                    .retain(|p| !(p.id == preference_id && p.request_id == request_id));
                if st.leave_preferences.len() == before {
                    return Ok(None);
                }
                Ok(Some(
                    st.leave_preferences.iter().filter(|p| p.request_id == request_id).count(),
                ))
            }
        }
    }
}
