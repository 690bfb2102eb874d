use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Accepted,
    OtherAccepted,
    Completed,
    Cancelled,
}

impl MatchStatus {
    /// Statuses that hold the unordered request pair; at most one such match per pair.
    pub const OPEN: [MatchStatus; 2] = [MatchStatus::Pending, MatchStatus::Accepted];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::OtherAccepted => "other_accepted",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    /// Legal edges of the match state machine.
    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        use MatchStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, OtherAccepted)
                | (Pending, Cancelled)
                | (Accepted, Completed)
                | (Accepted, Cancelled)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "accepted" => Ok(MatchStatus::Accepted),
            "other_accepted" => Ok(MatchStatus::OtherAccepted),
            "completed" => Ok(MatchStatus::Completed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// A pairing of two requests belonging to different workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PotentialMatch {
    pub id: i32,
    pub requester_request_id: i32,
    pub acceptor_request_id: i32,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl PotentialMatch {
    pub fn involves(&self, request_id: i32) -> bool {
        self.requester_request_id == request_id || self.acceptor_request_id == request_id
    }

    pub fn request_ids(&self) -> [i32; 2] {
        [self.requester_request_id, self.acceptor_request_id]
    }

    /// The other side of the pair, if `request_id` is one of the two.
    pub fn counterpart(&self, request_id: i32) -> Option<i32> {
        if self.requester_request_id == request_id {
            Some(self.acceptor_request_id)
        } else if self.acceptor_request_id == request_id {
            Some(self.requester_request_id)
        } else {
            None
        }
    }
}
