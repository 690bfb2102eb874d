use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::ShiftType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Matched,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Matched => "matched",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "matched" => Ok(RequestStatus::Matched),
            "completed" => Ok(RequestStatus::Completed),
            "cancelled" => Ok(RequestStatus::Cancelled),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// A worker's offer to give up one shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SwapRequest {
    pub id: i32,
    pub requester_id: i32,
    pub shift_id: Uuid,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// One acceptable target date. An empty `accepted_types` means any type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PreferredDate {
    pub id: i32,
    pub request_id: i32,
    pub date: NaiveDate,
    pub accepted_types: BTreeSet<ShiftType>,
}

impl PreferredDate {
    pub fn accepts(&self, shift_type: ShiftType) -> bool {
        self.accepted_types.is_empty() || self.accepted_types.contains(&shift_type)
    }
}

/// Which engine instantiation a request or match belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SwapKind {
    Shifts,
    Leave,
}

impl SwapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapKind::Shifts => "shifts",
            SwapKind::Leave => "leave",
        }
    }
}

impl fmt::Display for SwapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
