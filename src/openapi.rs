use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shift Swap API",
        version = "0.1.0",
        description = "Automatic matching of shift and leave-block swap requests"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        crate::handlers::health::health_check,

        crate::handlers::swaps_handler::run_matching,
        crate::handlers::swaps_handler::sweep,
        crate::handlers::swaps_handler::list_matches,
        crate::handlers::swaps_handler::accept_match,
        crate::handlers::swaps_handler::finalize_match,
        crate::handlers::swaps_handler::withdraw_match,
        crate::handlers::swaps_handler::cancel_request,
        crate::handlers::swaps_handler::remove_preference,
        crate::handlers::swaps_handler::create_swap_request,
        crate::handlers::swaps_handler::create_leave_request,
    ),
    components(
        schemas(
            crate::models::Shift,
            crate::models::ShiftType,
            crate::models::SwapKind,
            crate::models::SwapRequest,
            crate::models::RequestStatus,
            crate::models::PotentialMatch,
            crate::models::MatchStatus,
            crate::models::LeaveSwapRequest,
            crate::models::LeaveBlock,

            crate::models::CreateSwapRequestInput,
            crate::models::PreferredDateInput,
            crate::models::CreateLeaveSwapRequestInput,

            crate::models::RunSummary,
            crate::models::RunSummaryResponse,
            crate::models::SweepResponse,
            crate::models::SwapMutationResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check"),
        (name = "swaps", description = "Swap requests, matching runs and match lifecycle"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "service_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Service-Key"))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_swap_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/swaps/{kind}/run"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/swaps/sweep"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/swaps/{kind}/matches/{id}/accept"));
    }
}
