use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;

use super::matcher::Candidate;
use super::preferences::{PreferenceFit, PreferenceResolver};
use super::roster_index::{IndexedRequest, RosterIndex};
use crate::models::ShiftType;

/// Result of a pairwise check. Incompatibility is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<R> {
    Compatible,
    Incompatible(R),
}

impl<R> Verdict<R> {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Verdict::Compatible)
    }

    pub fn reason(&self) -> Option<&R> {
        match self {
            Verdict::Compatible => None,
            Verdict::Incompatible(reason) => Some(reason),
        }
    }
}

/// Mutual compatibility of two candidates. Implementations must be pure and
/// give the same verdict for `(a, b)` and `(b, a)`.
pub trait CompatibilityRule<C> {
    type Reason: fmt::Display;

    fn check(&self, a: &C, b: &C) -> Verdict<Self::Reason>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declinable<R> {
    /// A party withdrew from a match between these two requests.
    Declined,
    Rule(R),
}

impl<R: fmt::Display> fmt::Display for Declinable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declined => f.write_str("pair was withdrawn by a party"),
            Self::Rule(reason) => reason.fmt(f),
        }
    }
}

/// Wraps a rule so pairs a worker already withdrew from are never proposed again.
pub struct ExcludingDeclined<'a, R> {
    rule: &'a R,
    declined: &'a HashSet<(i32, i32)>,
}

impl<'a, R> ExcludingDeclined<'a, R> {
    /// `declined` holds pair keys, lower request id first.
    pub fn new(rule: &'a R, declined: &'a HashSet<(i32, i32)>) -> Self {
        Self { rule, declined }
    }
}

impl<C: Candidate, R: CompatibilityRule<C>> CompatibilityRule<C> for ExcludingDeclined<'_, R> {
    type Reason = Declinable<R::Reason>;

    fn check(&self, a: &C, b: &C) -> Verdict<Self::Reason> {
        let (x, y) = (a.request_id(), b.request_id());
        if self.declined.contains(&(x.min(y), x.max(y))) {
            return Verdict::Incompatible(Declinable::Declined);
        }
        match self.rule.check(a, b) {
            Verdict::Compatible => Verdict::Compatible,
            Verdict::Incompatible(reason) => Verdict::Incompatible(Declinable::Rule(reason)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShiftIncompatibility {
    SameWorker { worker_id: i32 },
    DateNotPreferred { worker_id: i32, date: NaiveDate },
    TypeNotAccepted { worker_id: i32, date: NaiveDate, shift_type: ShiftType },
    RosterConflict { worker_id: i32, date: NaiveDate },
}

impl fmt::Display for ShiftIncompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameWorker { worker_id } => {
                write!(f, "both requests belong to worker {}", worker_id)
            }
            Self::DateNotPreferred { worker_id, date } => {
                write!(f, "date mismatch: worker {} does not want {}", worker_id, date)
            }
            Self::TypeNotAccepted { worker_id, date, shift_type } => write!(
                f,
                "type mismatch: worker {} does not accept a {} shift on {}",
                worker_id, shift_type, date
            ),
            Self::RosterConflict { worker_id, date } => write!(
                f,
                "roster conflict: worker {} already works on {}",
                worker_id, date
            ),
        }
    }
}

/// Checks `a` against `b` in the canonical order (lower request id first),
/// so both the outcome and the first failing reason are order-independent.
pub fn is_compatible(
    a: &IndexedRequest,
    b: &IndexedRequest,
    index: &RosterIndex,
) -> Verdict<ShiftIncompatibility> {
    let (a, b) = if a.request.id <= b.request.id { (a, b) } else { (b, a) };

    if a.worker_id() == b.worker_id() {
        return Verdict::Incompatible(ShiftIncompatibility::SameWorker {
            worker_id: a.worker_id(),
        });
    }

    let resolver = PreferenceResolver::new(index);

    for (wants, offered) in [(a, b), (b, a)] {
        match resolver.fit(wants.request.id, offered.date(), offered.shift_type) {
            PreferenceFit::Accepted => {}
            PreferenceFit::DateNotPreferred => {
                return Verdict::Incompatible(ShiftIncompatibility::DateNotPreferred {
                    worker_id: wants.worker_id(),
                    date: offered.date(),
                });
            }
            PreferenceFit::TypeNotAccepted => {
                return Verdict::Incompatible(ShiftIncompatibility::TypeNotAccepted {
                    worker_id: wants.worker_id(),
                    date: offered.date(),
                    shift_type: offered.shift_type,
                });
            }
        }
    }

    // After the swap each worker gives up their own shift, so only other
    // commitments on the acquired date count.
    for (acquirer, offered) in [(a, b), (b, a)] {
        if index.has_other_commitment(acquirer.worker_id(), offered.date(), acquirer.shift.id) {
            return Verdict::Incompatible(ShiftIncompatibility::RosterConflict {
                worker_id: acquirer.worker_id(),
                date: offered.date(),
            });
        }
    }

    Verdict::Compatible
}

/// [`CompatibilityRule`] for shift swaps over one run's roster index.
pub struct ShiftCompatibility<'a> {
    index: &'a RosterIndex,
}

impl<'a> ShiftCompatibility<'a> {
    pub fn new(index: &'a RosterIndex) -> Self {
        Self { index }
    }
}

impl CompatibilityRule<IndexedRequest> for ShiftCompatibility<'_> {
    type Reason = ShiftIncompatibility;

    fn check(&self, a: &IndexedRequest, b: &IndexedRequest) -> Verdict<Self::Reason> {
        is_compatible(a, b, self.index)
    }
}
