use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{PotentialMatch, ShiftType};

/// One preferred target date as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PreferredDateInput {
    /// Calendar day; a full timestamp is accepted and truncated to its date part.
    pub date: String,
    #[serde(default)]
    pub accepted_types: Vec<ShiftType>,
}

/// Input for offering a shift in exchange for one of several dates
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSwapRequestInput {
    pub shift_id: Uuid,
    pub preferred_dates: Vec<PreferredDateInput>,
}

/// Input for offering a leave block in exchange for one of several block numbers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateLeaveSwapRequestInput {
    pub leave_block_id: i32,
    pub block_numbers: Vec<i32>,
}

/// Counts produced by one matching invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunSummary {
    #[serde(rename = "requestsConsidered")]
    pub requests_considered: usize,
    #[serde(rename = "matchesFound")]
    pub matches_found: usize,
    #[serde(rename = "matchesPersisted")]
    pub matches_persisted: usize,
}

impl RunSummary {
    pub fn message(&self) -> String {
        match self.matches_found {
            0 => format!(
                "No compatible swaps found among {} pending requests",
                self.requests_considered
            ),
            found => format!(
                "Found {} compatible swap(s) among {} pending requests, {} new",
                found, self.requests_considered, self.matches_persisted
            ),
        }
    }
}

/// Response for an on-demand matching run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunSummaryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: RunSummary,
    pub message: String,
}

/// Response for the scheduled/global sweep
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SweepResponse {
    pub shifts: Option<RunSummary>,
    pub leave: Option<RunSummary>,
    pub errors: Vec<String>,
}

/// Response for match and request mutations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SwapMutationResponse {
    pub success: bool,
    #[serde(rename = "match")]
    pub potential_match: Option<PotentialMatch>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_match_message_is_readable() {
        let summary = RunSummary {
            requests_considered: 4,
            ..Default::default()
        };
        assert_eq!(summary.message(), "No compatible swaps found among 4 pending requests");
    }

    #[test]
    fn test_summary_uses_camel_case_keys() {
        let summary = RunSummary {
            requests_considered: 2,
            matches_found: 1,
            matches_persisted: 1,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["matchesFound"], 1);
        assert_eq!(json["requestsConsidered"], 2);
    }

    #[test]
    fn test_accepted_types_default_empty() {
        let input: PreferredDateInput = serde_json::from_str(r#"{"date":"2025-06-05"}"#).unwrap();
        assert!(input.accepted_types.is_empty());
    }
}
