pub mod compatibility;
pub mod events;
pub mod leave;
pub mod lifecycle;
pub mod matcher;
pub mod preferences;
pub mod roster_index;
pub mod run;

#[cfg(test)]
pub mod testing;

pub use compatibility::{
    is_compatible, CompatibilityRule, Declinable, ExcludingDeclined, ShiftCompatibility, ShiftIncompatibility,
    Verdict,
};
pub use events::{MatchEvent, MatchEventType, Notifier};
pub use lifecycle::{Lifecycle, PreferenceRemoval, RecordOutcome};
pub use matcher::{Candidate, GreedyFirstFit, MatchStrategy, MatchedPair};
pub use run::{run_leave_matching, run_shift_matching, RunScope};
