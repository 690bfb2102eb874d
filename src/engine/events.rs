use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{PotentialMatch, SwapKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchEventType {
    MatchCreated,
    MatchAccepted,
    MatchCompleted,
}

impl MatchEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchEventType::MatchCreated => "match_created",
            MatchEventType::MatchAccepted => "match_accepted",
            MatchEventType::MatchCompleted => "match_completed",
        }
    }
}

/// Domain event consumed by the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchEvent {
    pub event: MatchEventType,
    pub kind: SwapKind,
    pub match_id: i32,
    pub requester_request_id: i32,
    pub acceptor_request_id: i32,
    pub occurred_at: DateTime<Utc>,
}

impl MatchEvent {
    pub fn new(event: MatchEventType, kind: SwapKind, m: &PotentialMatch) -> Self {
        Self {
            event,
            kind,
            match_id: m.id,
            requester_request_id: m.requester_request_id,
            acceptor_request_id: m.acceptor_request_id,
            occurred_at: Utc::now(),
        }
    }
}

/// Fire-and-forget publication. Implementations must not block and must
/// swallow delivery failures.
pub trait Notifier: Send + Sync {
    fn publish(&self, event: MatchEvent);
}
