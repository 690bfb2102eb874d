use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use serde_json::json;
use std::sync::Arc;

use crate::{auth, AppState};

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The worker on whose behalf a request acts.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedWorker {
    pub worker_id: i32,
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedWorker {
    type Rejection = (StatusCode, axum::Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"error": "Missing authentication: no Authorization bearer token"})),
            )
        })?;

        let worker_id = auth::validate_worker_token(token, &state.config.worker_token_secret)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected worker token");
                (StatusCode::UNAUTHORIZED, axum::Json(json!({"error": e})))
            })?;

        Ok(AuthenticatedWorker { worker_id })
    }
}
