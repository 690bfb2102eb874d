use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{PreferredDate, RequestStatus, Shift, ShiftType, SwapRequest};

/// One committed shift on a worker's roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterDay {
    pub shift_id: Uuid,
    pub date: NaiveDate,
}

/// Raw rows as read from the store for one run.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    pub requests: Vec<SwapRequest>,
    pub shifts: Vec<Shift>,
    pub preferred_dates: Vec<PreferredDate>,
    pub roster: HashMap<i32, Vec<RosterDay>>,
}

/// A pending request joined with the shift it offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRequest {
    pub request: SwapRequest,
    pub shift: Shift,
    pub shift_type: ShiftType,
}

impl IndexedRequest {
    pub fn worker_id(&self) -> i32 {
        self.request.requester_id
    }

    pub fn date(&self) -> NaiveDate {
        self.shift.date
    }
}

#[derive(Debug, Default)]
pub struct RosterIndex {
    entries: Vec<IndexedRequest>,
    shifts_by_date: HashMap<NaiveDate, Vec<Shift>>,
    shifts_by_worker: HashMap<i32, HashMap<NaiveDate, Vec<Uuid>>>,
    requests_by_worker: HashMap<i32, Vec<SwapRequest>>,
    preferred_dates: HashMap<i32, Vec<PreferredDate>>,
}

/// Parses a calendar day, truncating any time or offset suffix so that
/// `2025-06-01T23:30:00-05:00` and `2025-06-01` map to the same key.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}': {}", raw, e))
}

impl RosterIndex {
    pub fn build(snapshot: RosterSnapshot) -> Self {
        let RosterSnapshot {
            mut requests,
            shifts,
            preferred_dates,
            roster,
        } = snapshot;

        // Stable order: creation time, then id for identical timestamps.
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let shifts_by_id: HashMap<Uuid, Shift> = shifts.into_iter().map(|s| (s.id, s)).collect();

        let mut index = RosterIndex::default();

        for (worker_id, days) in roster {
            let dates = index.shifts_by_worker.entry(worker_id).or_default();
            for day in days {
                let ids = dates.entry(day.date).or_default();
                if !ids.contains(&day.shift_id) {
                    ids.push(day.shift_id);
                }
            }
        }

        for request in requests {
            if request.status != RequestStatus::Pending {
                tracing::debug!(request_id = request.id, status = %request.status, "Skipping non-pending request");
                continue;
            }

            let Some(shift) = shifts_by_id.get(&request.shift_id).cloned() else {
                tracing::warn!(
                    request_id = request.id,
                    shift_id = %request.shift_id,
                    "Swap request references a missing shift, dropping it from this run"
                );
                continue;
            };

            if shift.worker_id != request.requester_id {
                tracing::warn!(
                    request_id = request.id,
                    requester_id = request.requester_id,
                    shift_owner = shift.worker_id,
                    "Offered shift no longer belongs to the requester, dropping it from this run"
                );
                continue;
            }

            // The offered shift is itself a roster commitment.
            let ids = index
                .shifts_by_worker
                .entry(shift.worker_id)
                .or_default()
                .entry(shift.date)
                .or_default();
            if !ids.contains(&shift.id) {
                ids.push(shift.id);
            }

            index
                .shifts_by_date
                .entry(shift.date)
                .or_default()
                .push(shift.clone());
            index
                .requests_by_worker
                .entry(request.requester_id)
                .or_default()
                .push(request.clone());

            let shift_type = shift.shift_type();
            index.entries.push(IndexedRequest {
                request,
                shift,
                shift_type,
            });
        }

        for preferred in preferred_dates {
            index
                .preferred_dates
                .entry(preferred.request_id)
                .or_default()
                .push(preferred);
        }

        tracing::debug!(
            requests = index.entries.len(),
            workers = index.requests_by_worker.len(),
            offered_dates = index.shifts_by_date.len(),
            "Roster index built"
        );

        index
    }

    /// Pending requests in deterministic matching order.
    pub fn entries(&self) -> &[IndexedRequest] {
        &self.entries
    }

    /// Whether the worker holds a shift on `date` other than `except`.
    pub fn has_other_commitment(&self, worker_id: i32, date: NaiveDate, except: Uuid) -> bool {
        self.shifts_by_worker
            .get(&worker_id)
            .and_then(|dates| dates.get(&date))
            .is_some_and(|ids| ids.iter().any(|id| *id != except))
    }

    /// The worker's pending requests that made it into this run.
    pub fn requests_of(&self, worker_id: i32) -> &[SwapRequest] {
        self.requests_by_worker
            .get(&worker_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn preferred_dates(&self, request_id: i32) -> &[PreferredDate] {
        self.preferred_dates
            .get(&request_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{date, request, shift};

    #[test]
    fn test_normalize_date_truncates_time() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(normalize_date("2025-06-01").unwrap(), expected);
        assert_eq!(normalize_date("2025-06-01T23:30:00-05:00").unwrap(), expected);
        assert_eq!(normalize_date(" 2025-06-01 ").unwrap(), expected);
        assert!(normalize_date("06/01/2025").is_err());
        assert!(normalize_date("").is_err());
    }

    #[test]
    fn test_missing_shift_is_dropped_not_fatal() {
        let kept = shift(10, "2025-06-01", 7);
        let snapshot = RosterSnapshot {
            requests: vec![request(1, 10, kept.id, 0), request(2, 20, Uuid::new_v4(), 1)],
            shifts: vec![kept],
            ..Default::default()
        };

        let index = RosterIndex::build(snapshot);
        assert_eq!(index.entries().len(), 1);
        assert_eq!(index.entries()[0].request.id, 1);
        assert!(index.requests_of(20).is_empty());
    }

    #[test]
    fn test_entries_sorted_by_creation_time() {
        let s1 = shift(10, "2025-06-01", 7);
        let s2 = shift(20, "2025-06-02", 7);
        let s3 = shift(30, "2025-06-03", 7);
        let snapshot = RosterSnapshot {
            requests: vec![
                request(3, 30, s3.id, 5),
                request(1, 10, s1.id, 9),
                request(2, 20, s2.id, 1),
            ],
            shifts: vec![s1, s2, s3],
            ..Default::default()
        };

        let index = RosterIndex::build(snapshot);
        let order: Vec<i32> = index.entries().iter().map(|e| e.request.id).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_offered_shift_is_not_a_conflict_with_itself() {
        let offered = shift(10, "2025-06-01", 7);
        let other = shift(10, "2025-06-05", 15);
        let snapshot = RosterSnapshot {
            requests: vec![request(1, 10, offered.id, 0)],
            shifts: vec![offered.clone()],
            roster: HashMap::from([(
                10,
                vec![
                    RosterDay { shift_id: offered.id, date: offered.date },
                    RosterDay { shift_id: other.id, date: other.date },
                ],
            )]),
            ..Default::default()
        };

        let index = RosterIndex::build(snapshot);
        assert!(!index.has_other_commitment(10, date("2025-06-01"), offered.id));
        assert!(index.has_other_commitment(10, date("2025-06-05"), offered.id));
        assert_eq!(index.shifts_by_worker[&10].len(), 2);
        assert_eq!(index.shifts_by_date[&date("2025-06-01")].len(), 1);
        assert_eq!(index.entries()[0].shift_type, ShiftType::Day);
    }

    #[test]
    fn test_non_pending_and_foreign_shift_requests_dropped() {
        let s1 = shift(10, "2025-06-01", 7);
        let mut matched = request(1, 10, s1.id, 0);
        matched.status = RequestStatus::Matched;
        let foreign = request(2, 99, s1.id, 1);

        let index = RosterIndex::build(RosterSnapshot {
            requests: vec![matched, foreign],
            shifts: vec![s1],
            ..Default::default()
        });
        assert!(index.entries().is_empty());
    }
}
