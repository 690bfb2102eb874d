use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    engine::{run_leave_matching, run_shift_matching, GreedyFirstFit, RunScope},
    extractors::AuthenticatedWorker,
    models::{
        CreateLeaveSwapRequestInput, CreateSwapRequestInput, LeaveSwapRequest, PotentialMatch,
        RunSummaryResponse, SwapKind, SwapMutationResponse, SwapRequest, SweepResponse,
    },
    scheduler, AppError, AppResult, AppState,
};

/// POST /api/swaps/{kind}/run - Run matching for the caller's requests
#[utoipa::path(
    post,
    path = "/api/swaps/{kind}/run",
    params(("kind" = SwapKind, Path, description = "shifts or leave")),
    responses(
        (status = 200, description = "Matching run summary", body = RunSummaryResponse),
        (status = 401, description = "Missing or invalid worker token"),
        (status = 503, description = "Swap data could not be read, try again later")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn run_matching(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SwapKind>,
    auth: AuthenticatedWorker,
) -> AppResult<Json<RunSummaryResponse>> {
    let scope = RunScope::Worker(auth.worker_id);
    let result = match kind {
        SwapKind::Shifts => {
            run_shift_matching(
                &state.shift_source,
                &state.shift_matches,
                state.notifier.as_ref(),
                &GreedyFirstFit,
                scope,
            )
            .await
        }
        SwapKind::Leave => {
            run_leave_matching(
                &state.leave_source,
                &state.leave_matches,
                state.notifier.as_ref(),
                &GreedyFirstFit,
                scope,
            )
            .await
        }
    };

    let summary = result.map_err(|e| match e {
        AppError::DataUnavailable(_) => AppError::DataUnavailable(
            "Swap matching is temporarily unavailable. Please try again shortly.".to_string(),
        ),
        other => other,
    })?;

    Ok(Json(RunSummaryResponse {
        success: true,
        message: summary.message(),
        summary,
    }))
}

/// POST /api/swaps/sweep - Scheduler trigger for a global run of both kinds
#[utoipa::path(
    post,
    path = "/api/swaps/sweep",
    responses(
        (status = 200, description = "Per-kind summaries and any per-kind errors", body = SweepResponse),
        (status = 401, description = "Missing or invalid service key")
    ),
    tag = "swaps",
    security(("service_key" = []))
)]
pub async fn sweep(State(state): State<Arc<AppState>>) -> Json<SweepResponse> {
    Json(scheduler::sweep_once(&state).await)
}

/// GET /api/swaps/{kind}/matches - The caller's actionable matches, newest first
#[utoipa::path(
    get,
    path = "/api/swaps/{kind}/matches",
    params(("kind" = SwapKind, Path, description = "shifts or leave")),
    responses(
        (status = 200, description = "Pending and accepted matches involving the caller", body = Vec<PotentialMatch>),
        (status = 401, description = "Missing or invalid worker token")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SwapKind>,
    auth: AuthenticatedWorker,
) -> AppResult<Json<Vec<PotentialMatch>>> {
    let matches = state.lifecycle(kind).visible_matches(auth.worker_id).await?;
    Ok(Json(matches))
}

/// POST /api/swaps/{kind}/matches/{id}/accept
#[utoipa::path(
    post,
    path = "/api/swaps/{kind}/matches/{id}/accept",
    params(
        ("kind" = SwapKind, Path, description = "shifts or leave"),
        ("id" = i32, Path, description = "Match ID")
    ),
    responses(
        (status = 200, description = "Match accepted; competing matches were retired", body = SwapMutationResponse),
        (status = 403, description = "Caller is not a party to the match"),
        (status = 404, description = "Match not found"),
        (status = 409, description = "Match is not pending")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn accept_match(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SwapKind>,
    auth: AuthenticatedWorker,
    Path(match_id): Path<i32>,
) -> AppResult<Json<SwapMutationResponse>> {
    let m = state.lifecycle(kind).accept(match_id, auth.worker_id).await?;
    Ok(Json(SwapMutationResponse {
        success: true,
        message: Some(format!("Match {} accepted", m.id)),
        potential_match: Some(m),
    }))
}

/// POST /api/swaps/{kind}/matches/{id}/finalize
#[utoipa::path(
    post,
    path = "/api/swaps/{kind}/matches/{id}/finalize",
    params(
        ("kind" = SwapKind, Path, description = "shifts or leave"),
        ("id" = i32, Path, description = "Match ID")
    ),
    responses(
        (status = 200, description = "Swap completed", body = SwapMutationResponse),
        (status = 403, description = "Caller is not a party to the match"),
        (status = 404, description = "Match not found"),
        (status = 409, description = "Match is not accepted")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn finalize_match(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SwapKind>,
    auth: AuthenticatedWorker,
    Path(match_id): Path<i32>,
) -> AppResult<Json<SwapMutationResponse>> {
    let m = state.lifecycle(kind).finalize(match_id, auth.worker_id).await?;
    Ok(Json(SwapMutationResponse {
        success: true,
        message: Some(format!("Match {} completed", m.id)),
        potential_match: Some(m),
    }))
}

/// POST /api/swaps/{kind}/matches/{id}/withdraw
#[utoipa::path(
    post,
    path = "/api/swaps/{kind}/matches/{id}/withdraw",
    params(
        ("kind" = SwapKind, Path, description = "shifts or leave"),
        ("id" = i32, Path, description = "Match ID")
    ),
    responses(
        (status = 200, description = "Match cancelled", body = SwapMutationResponse),
        (status = 403, description = "Caller is not a party to the match"),
        (status = 404, description = "Match not found"),
        (status = 409, description = "Match is no longer open")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn withdraw_match(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SwapKind>,
    auth: AuthenticatedWorker,
    Path(match_id): Path<i32>,
) -> AppResult<Json<SwapMutationResponse>> {
    let m = state.lifecycle(kind).withdraw(match_id, auth.worker_id).await?;
    Ok(Json(SwapMutationResponse {
        success: true,
        message: Some(format!("Match {} withdrawn", m.id)),
        potential_match: Some(m),
    }))
}

/// DELETE /api/swaps/{kind}/requests/{id} - Cancel one of the caller's requests
#[utoipa::path(
    delete,
    path = "/api/swaps/{kind}/requests/{id}",
    params(
        ("kind" = SwapKind, Path, description = "shifts or leave"),
        ("id" = i32, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "Request and its open matches cancelled", body = SwapMutationResponse),
        (status = 403, description = "Request belongs to another worker"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is already completed")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SwapKind>,
    auth: AuthenticatedWorker,
    Path(request_id): Path<i32>,
) -> AppResult<Json<SwapMutationResponse>> {
    let cancelled = state
        .lifecycle(kind)
        .cancel_owned(request_id, auth.worker_id)
        .await?;
    Ok(Json(SwapMutationResponse {
        success: true,
        potential_match: None,
        message: Some(format!(
            "Request {} cancelled along with {} open match(es)",
            request_id, cancelled
        )),
    }))
}

/// DELETE /api/swaps/shifts/requests/{id}/preferred-dates/{pid}
#[utoipa::path(
    delete,
    path = "/api/swaps/shifts/requests/{id}/preferred-dates/{pid}",
    params(
        ("id" = i32, Path, description = "Request ID"),
        ("pid" = i32, Path, description = "Preferred date ID")
    ),
    responses(
        (status = 200, description = "Preference removed; the request is cancelled when none remain", body = SwapMutationResponse),
        (status = 403, description = "Request belongs to another worker"),
        (status = 404, description = "Request or preference not found")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn remove_preference(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SwapKind>,
    auth: AuthenticatedWorker,
    Path((request_id, preference_id)): Path<(i32, i32)>,
) -> AppResult<Json<SwapMutationResponse>> {
    let removal = state
        .lifecycle(kind)
        .remove_preference(request_id, preference_id, auth.worker_id)
        .await?;

    let message = if removal.request_cancelled {
        format!("Last preference removed; request {} cancelled", request_id)
    } else {
        format!("Preference removed; {} remaining", removal.remaining)
    };

    Ok(Json(SwapMutationResponse {
        success: true,
        potential_match: None,
        message: Some(message),
    }))
}

/// POST /api/swaps/shifts/requests - Offer a shift for swapping
#[utoipa::path(
    post,
    path = "/api/swaps/shifts/requests",
    request_body = CreateSwapRequestInput,
    responses(
        (status = 200, description = "Swap request created", body = SwapRequest),
        (status = 400, description = "No preferred dates, or a date is malformed"),
        (status = 403, description = "Shift belongs to another worker"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Shift already has an active swap request")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn create_swap_request(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedWorker,
    Json(input): Json<CreateSwapRequestInput>,
) -> AppResult<Json<SwapRequest>> {
    let request = state
        .shift_source
        .create_swap_request(auth.worker_id, &input)
        .await?;
    Ok(Json(request))
}

/// POST /api/swaps/leave/requests - Offer a leave block for swapping
#[utoipa::path(
    post,
    path = "/api/swaps/leave/requests",
    request_body = CreateLeaveSwapRequestInput,
    responses(
        (status = 200, description = "Leave swap request created", body = LeaveSwapRequest),
        (status = 400, description = "No wanted block numbers, or the offered block is among them"),
        (status = 403, description = "Leave block belongs to another worker"),
        (status = 404, description = "Leave block not found"),
        (status = 409, description = "Leave block already has an active swap request")
    ),
    tag = "swaps",
    security(("bearer_auth" = []))
)]
pub async fn create_leave_request(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedWorker,
    Json(input): Json<CreateLeaveSwapRequestInput>,
) -> AppResult<Json<LeaveSwapRequest>> {
    let request = state
        .leave_source
        .create_leave_request(auth.worker_id, &input)
        .await?;
    Ok(Json(request))
}
