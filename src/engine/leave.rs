use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::compatibility::{CompatibilityRule, Verdict};
use super::matcher::Candidate;
use crate::models::{LeaveBlock, LeavePreference, LeaveSwapRequest, RequestStatus};

/// Leave-block counterpart of the roster snapshot: numbered blocks instead of dated shifts.
#[derive(Debug, Clone, Default)]
pub struct LeaveSnapshot {
    pub requests: Vec<LeaveSwapRequest>,
    pub blocks: Vec<LeaveBlock>,
    pub preferences: Vec<LeavePreference>,
    pub holdings: HashMap<i32, Vec<LeaveBlock>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedLeaveRequest {
    pub request: LeaveSwapRequest,
    pub block: LeaveBlock,
}

impl Candidate for IndexedLeaveRequest {
    fn request_id(&self) -> i32 {
        self.request.id
    }

    fn worker_id(&self) -> i32 {
        self.request.requester_id
    }
}

#[derive(Debug, Default)]
pub struct LeaveIndex {
    entries: Vec<IndexedLeaveRequest>,
    holdings_by_worker: HashMap<i32, Vec<LeaveBlock>>,
    wanted_by_request: HashMap<i32, BTreeSet<i32>>,
}

impl LeaveIndex {
    pub fn build(snapshot: LeaveSnapshot) -> Self {
        let LeaveSnapshot {
            mut requests,
            blocks,
            preferences,
            holdings,
        } = snapshot;

        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let blocks_by_id: HashMap<i32, LeaveBlock> = blocks.into_iter().map(|b| (b.id, b)).collect();

        let mut index = LeaveIndex {
            holdings_by_worker: holdings,
            ..Default::default()
        };

        for request in requests {
            if request.status != RequestStatus::Pending {
                continue;
            }

            let Some(block) = blocks_by_id.get(&request.leave_block_id).cloned() else {
                tracing::warn!(
                    request_id = request.id,
                    leave_block_id = request.leave_block_id,
                    "Leave swap request references a missing block, dropping it from this run"
                );
                continue;
            };

            if block.worker_id != request.requester_id {
                tracing::warn!(
                    request_id = request.id,
                    requester_id = request.requester_id,
                    block_owner = block.worker_id,
                    "Offered leave block no longer belongs to the requester, dropping it from this run"
                );
                continue;
            }

            let held = index.holdings_by_worker.entry(block.worker_id).or_default();
            if !held.iter().any(|b| b.id == block.id) {
                held.push(block.clone());
            }

            index.entries.push(IndexedLeaveRequest { request, block });
        }

        for preference in preferences {
            index
                .wanted_by_request
                .entry(preference.request_id)
                .or_default()
                .insert(preference.block_number);
        }

        index
    }

    pub fn entries(&self) -> &[IndexedLeaveRequest] {
        &self.entries
    }

    pub fn wants(&self, request_id: i32, block_number: i32) -> bool {
        self.wanted_by_request
            .get(&request_id)
            .is_some_and(|wanted| wanted.contains(&block_number))
    }

    /// Whether the worker holds `block_number` through a block other than `except`.
    pub fn holds_other(&self, worker_id: i32, block_number: i32, except: i32) -> bool {
        self.holdings_by_worker
            .get(&worker_id)
            .is_some_and(|held| {
                held.iter()
                    .any(|b| b.block_number == block_number && b.id != except)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveIncompatibility {
    SameWorker { worker_id: i32 },
    BlockNotWanted { worker_id: i32, block_number: i32 },
    AlreadyHoldsBlock { worker_id: i32, block_number: i32 },
}

impl fmt::Display for LeaveIncompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameWorker { worker_id } => {
                write!(f, "both requests belong to worker {}", worker_id)
            }
            Self::BlockNotWanted { worker_id, block_number } => write!(
                f,
                "block mismatch: worker {} does not want block {}",
                worker_id, block_number
            ),
            Self::AlreadyHoldsBlock { worker_id, block_number } => write!(
                f,
                "roster conflict: worker {} already holds block {}",
                worker_id, block_number
            ),
        }
    }
}

pub struct LeaveCompatibility<'a> {
    index: &'a LeaveIndex,
}

impl<'a> LeaveCompatibility<'a> {
    pub fn new(index: &'a LeaveIndex) -> Self {
        Self { index }
    }
}

impl CompatibilityRule<IndexedLeaveRequest> for LeaveCompatibility<'_> {
    type Reason = LeaveIncompatibility;

    fn check(
        &self,
        a: &IndexedLeaveRequest,
        b: &IndexedLeaveRequest,
    ) -> Verdict<LeaveIncompatibility> {
        let (a, b) = if a.request.id <= b.request.id { (a, b) } else { (b, a) };

        if a.worker_id() == b.worker_id() {
            return Verdict::Incompatible(LeaveIncompatibility::SameWorker {
                worker_id: a.worker_id(),
            });
        }

        for (wants, offered) in [(a, b), (b, a)] {
            if !self.index.wants(wants.request.id, offered.block.block_number) {
                return Verdict::Incompatible(LeaveIncompatibility::BlockNotWanted {
                    worker_id: wants.worker_id(),
                    block_number: offered.block.block_number,
                });
            }
        }

        for (acquirer, offered) in [(a, b), (b, a)] {
            if self
                .index
                .holds_other(acquirer.worker_id(), offered.block.block_number, acquirer.block.id)
            {
                return Verdict::Incompatible(LeaveIncompatibility::AlreadyHoldsBlock {
                    worker_id: acquirer.worker_id(),
                    block_number: offered.block.block_number,
                });
            }
        }

        Verdict::Compatible
    }
}
