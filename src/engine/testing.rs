use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{PreferredDate, RequestStatus, Shift, ShiftType, SwapRequest};

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

pub fn created(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// An eight hour shift starting at `start_hour`.
pub fn shift(worker_id: i32, day: &str, start_hour: u32) -> Shift {
    Shift {
        id: Uuid::new_v4(),
        worker_id,
        date: date(day),
        start_time: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt((start_hour + 8) % 24, 0, 0).unwrap(),
    }
}

pub fn request(id: i32, worker_id: i32, shift_id: Uuid, created_minutes: i64) -> SwapRequest {
    SwapRequest {
        id,
        requester_id: worker_id,
        shift_id,
        status: RequestStatus::Pending,
        created_at: created(created_minutes),
    }
}

pub fn preferred(id: i32, request_id: i32, day: &str, types: &[ShiftType]) -> PreferredDate {
    PreferredDate {
        id,
        request_id,
        date: date(day),
        accepted_types: types.iter().copied().collect::<BTreeSet<_>>(),
    }
}
