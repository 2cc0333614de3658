//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] generates the OpenAPI specification for the REST API:
//! registration, network queries, moderation, and health probes, plus the
//! bearer-token security scheme. Swagger UI serves the document in debug
//! builds at `/docs`.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the bearer-token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "BearerToken",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::inbound::http::registration::register,
        crate::inbound::http::network::network_summary,
        crate::inbound::http::network::list_direct_referrals,
        crate::inbound::http::admin::deactivate_code,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        crate::inbound::http::registration::RegisterRequestBody,
        crate::inbound::http::registration::RegisterResponse,
        crate::inbound::http::network::NetworkSummaryResponse,
        crate::inbound::http::network::DirectReferralEntry,
        crate::domain::Error,
        crate::domain::ErrorCode,
        crate::domain::Rank,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "registration", description = "Registration and referral crediting"),
        (name = "network", description = "Caller-facing network visibility"),
        (name = "admin", description = "Referral code moderation"),
        (name = "health", description = "Orchestration probes")
    )
)]
pub struct ApiDoc;
