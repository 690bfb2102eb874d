use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    handlers::{self, swaps_handler},
    middleware::{metrics_middleware, request_id_middleware, require_service_key},
    models::SwapKind,
    openapi::ApiDoc,
    AppState,
};

type AppRouter = Router<Arc<AppState>>;

/// Routes shared by both swap kinds; `extra` carries the kind-specific ones.
fn kind_routes(kind: SwapKind, extra: AppRouter) -> AppRouter {
    Router::new()
        .route("/run", post(swaps_handler::run_matching))
        .route("/matches", get(swaps_handler::list_matches))
        .route("/matches/{id}/accept", post(swaps_handler::accept_match))
        .route("/matches/{id}/finalize", post(swaps_handler::finalize_match))
        .route("/matches/{id}/withdraw", post(swaps_handler::withdraw_match))
        .route("/requests/{id}", delete(swaps_handler::cancel_request))
        .merge(extra)
        .layer(Extension(kind))
}

pub fn build_router(state: Arc<AppState>) -> Result<Router, String> {
    let origin = HeaderValue::from_str(&state.config.cors_origin)
        .map_err(|e| format!("CORS_ORIGIN is not a valid header value: {}", e))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true);

    let shift_routes = kind_routes(
        SwapKind::Shifts,
        Router::new()
            .route("/requests", post(swaps_handler::create_swap_request))
            .route(
                "/requests/{id}/preferred-dates/{pid}",
                delete(swaps_handler::remove_preference),
            ),
    );

    let leave_routes = kind_routes(
        SwapKind::Leave,
        Router::new()
            .route("/requests", post(swaps_handler::create_leave_request))
            .route(
                "/requests/{id}/preferences/{pid}",
                delete(swaps_handler::remove_preference),
            ),
    );

    let sweep_routes = Router::new()
        .route("/api/swaps/sweep", post(swaps_handler::sweep))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_service_key,
        ));

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Ok(Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/swaps/shifts", shift_routes)
        .nest("/api/swaps/leave", leave_routes)
        .merge(sweep_routes)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace)
        .layer(cors)
        .with_state(state))
}
