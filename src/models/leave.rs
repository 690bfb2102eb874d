use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RequestStatus;

/// A numbered block of annual leave held by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaveBlock {
    pub id: i32,
    pub worker_id: i32,
    pub block_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaveSwapRequest {
    pub id: i32,
    pub requester_id: i32,
    pub leave_block_id: i32,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeavePreference {
    pub id: i32,
    pub request_id: i32,
    pub block_number: i32,
}
