use serde::Serialize;
use std::collections::HashSet;

use super::compatibility::{CompatibilityRule, Verdict};
use super::roster_index::IndexedRequest;

/// Anything the matcher can pair: a pending request owned by one worker.
pub trait Candidate {
    fn request_id(&self) -> i32;
    fn worker_id(&self) -> i32;
}

impl Candidate for IndexedRequest {
    fn request_id(&self) -> i32 {
        self.request.id
    }

    fn worker_id(&self) -> i32 {
        self.request.requester_id
    }
}

/// A newly discovered pair; the requester side is the one that came first in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MatchedPair {
    pub requester_request_id: i32,
    pub acceptor_request_id: i32,
}

impl MatchedPair {
    pub fn involves(&self, request_id: i32) -> bool {
        self.requester_request_id == request_id || self.acceptor_request_id == request_id
    }

    /// Order-independent identity of the pair.
    pub fn key(&self) -> (i32, i32) {
        let (a, b) = (self.requester_request_id, self.acceptor_request_id);
        (a.min(b), a.max(b))
    }
}

/// A pairing strategy over an ordered candidate pool. Output pairs are disjoint.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn pair<C, R>(&self, pool: &[C], rule: &R) -> Vec<MatchedPair>
    where
        C: Candidate,
        R: CompatibilityRule<C>;
}

/// First-fit greedy pairing: each request takes the first later compatible request.
/// Not maximum-cardinality; an early pairing can block a better one later in the pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyFirstFit;

impl MatchStrategy for GreedyFirstFit {
    fn name(&self) -> &'static str {
        "greedy_first_fit"
    }

    fn pair<C, R>(&self, pool: &[C], rule: &R) -> Vec<MatchedPair>
    where
        C: Candidate,
        R: CompatibilityRule<C>,
    {
        // Scoped to this call; never shared between runs.
        let mut consumed: HashSet<i32> = HashSet::with_capacity(pool.len());
        let mut pairs = Vec::new();

        for (i, a) in pool.iter().enumerate() {
            if consumed.contains(&a.request_id()) {
                continue;
            }

            for b in &pool[i + 1..] {
                if consumed.contains(&b.request_id()) || a.worker_id() == b.worker_id() {
                    continue;
                }

                match rule.check(a, b) {
                    Verdict::Compatible => {
                        consumed.insert(a.request_id());
                        consumed.insert(b.request_id());
                        pairs.push(MatchedPair {
                            requester_request_id: a.request_id(),
                            acceptor_request_id: b.request_id(),
                        });
                        break;
                    }
                    Verdict::Incompatible(reason) => {
                        tracing::trace!(
                            a = a.request_id(),
                            b = b.request_id(),
                            %reason,
                            "Requests not compatible"
                        );
                    }
                }
            }
        }

        pairs
    }
}
