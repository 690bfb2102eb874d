pub mod leave;
pub mod potential_match;
pub mod shift;
pub mod swap;
pub mod swap_input;

pub use leave::{LeaveBlock, LeavePreference, LeaveSwapRequest};
pub use potential_match::{MatchStatus, PotentialMatch};
pub use shift::{Shift, ShiftType};
pub use swap::{PreferredDate, RequestStatus, SwapKind, SwapRequest};
pub use swap_input::{
    CreateLeaveSwapRequestInput, CreateSwapRequestInput, PreferredDateInput, RunSummary,
    RunSummaryResponse, SwapMutationResponse, SweepResponse,
};
