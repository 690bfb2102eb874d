use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::{AppError, AppState};

pub const SERVICE_KEY_HEADER: &str = "X-Service-Key";

/// Guards the internal sweep endpoint used by the platform scheduler.
pub async fn require_service_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing service key".to_string()))?;

    if bool::from(state.config.service_key.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rejected sweep trigger with an invalid service key");
        Err(AppError::Unauthorized("Invalid service key".to_string()))
    }
}
