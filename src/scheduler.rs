use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::{run_leave_matching, run_shift_matching, GreedyFirstFit, RunScope};
use crate::models::SweepResponse;
use crate::AppState;

/// Shift matching, then leave matching; a failed kind does not stop the other.
pub async fn sweep_once(state: &AppState) -> SweepResponse {
    let mut response = SweepResponse {
        shifts: None,
        leave: None,
        errors: Vec::new(),
    };

    match run_shift_matching(
        &state.shift_source,
        &state.shift_matches,
        state.notifier.as_ref(),
        &GreedyFirstFit,
        RunScope::Global,
    )
    .await
    {
        Ok(summary) => response.shifts = Some(summary),
        Err(e) => response.errors.push(format!("shifts: {}", e)),
    }

    match run_leave_matching(
        &state.leave_source,
        &state.leave_matches,
        state.notifier.as_ref(),
        &GreedyFirstFit,
        RunScope::Global,
    )
    .await
    {
        Ok(summary) => response.leave = Some(summary),
        Err(e) => response.errors.push(format!("leave: {}", e)),
    }

    response
}

pub fn spawn_sweep(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(state.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_secs = state.config.sweep_interval.as_secs(), "Matching sweep scheduled");

        loop {
            ticker.tick().await;
            let result = sweep_once(&state).await;
            if result.errors.is_empty() {
                tracing::debug!("Scheduled sweep finished");
            } else {
                tracing::warn!(errors = ?result.errors, "Scheduled sweep finished with errors");
            }
        }
    })
}
