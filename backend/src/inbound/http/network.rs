//! Network visibility API handlers.
//!
//! ```text
//! GET /api/v1/network
//! GET /api/v1/network/referrals
//! ```

use actix_web::{HttpRequest, get, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Rank;
use crate::domain::ports::{DirectReferral, NetworkSummary};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth;
use crate::inbound::http::state::HttpState;

/// Caller's network position for `GET /api/v1/network`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummaryResponse {
    /// The caller's own shareable code.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "TLW-7KQ2MF")]
    pub referral_code: Option<String>,
    /// Current rank.
    pub rank: Rank,
    /// One-based tier number of `rank`.
    pub tier: u8,
    /// Direct referral count.
    pub direct_referrals: u32,
    /// Cumulative downstream team size.
    pub team_size: u32,
    /// Immediate referrer identity, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
}

impl From<NetworkSummary> for NetworkSummaryResponse {
    fn from(value: NetworkSummary) -> Self {
        Self {
            referral_code: value.referral_code.map(|code| code.to_string()),
            tier: value.rank.tier(),
            rank: value.rank,
            direct_referrals: value.direct_referrals,
            team_size: value.team_size,
            referred_by: value.referred_by.map(|id| id.to_string()),
        }
    }
}

/// One entry of `GET /api/v1/network/referrals`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectReferralEntry {
    /// The referred user's identity.
    pub id: String,
    /// Their display name.
    pub display_name: String,
    /// RFC 3339 registration time.
    pub joined_at: String,
}

impl From<DirectReferral> for DirectReferralEntry {
    fn from(value: DirectReferral) -> Self {
        Self {
            id: value.id.to_string(),
            display_name: value.display_name.to_string(),
            joined_at: value.joined_at.to_rfc3339(),
        }
    }
}

/// Summarise the caller's own network position.
#[utoipa::path(
    get,
    path = "/api/v1/network",
    responses(
        (status = 200, description = "Network summary", body = NetworkSummaryResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::domain::Error),
        (status = 404, description = "Caller has not registered yet", body = crate::domain::Error)
    ),
    tags = ["network"],
    operation_id = "networkSummary",
    security(("BearerToken" = []))
)]
#[get("/network")]
pub async fn network_summary(
    state: web::Data<HttpState>,
    req: HttpRequest,
) -> ApiResult<web::Json<NetworkSummaryResponse>> {
    let caller = auth::require_caller(&state, &req).await?;
    let summary = state.network.summary(&caller.user_id).await?;
    Ok(web::Json(NetworkSummaryResponse::from(summary)))
}

/// List the caller's direct referrals, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/network/referrals",
    responses(
        (status = 200, description = "Direct referrals", body = [DirectReferralEntry]),
        (status = 401, description = "Missing or invalid bearer token", body = crate::domain::Error)
    ),
    tags = ["network"],
    operation_id = "listDirectReferrals",
    security(("BearerToken" = []))
)]
#[get("/network/referrals")]
pub async fn list_direct_referrals(
    state: web::Data<HttpState>,
    req: HttpRequest,
) -> ApiResult<web::Json<Vec<DirectReferralEntry>>> {
    let caller = auth::require_caller(&state, &req).await?;
    let referrals = state.network.direct_referrals(&caller.user_id).await?;
    Ok(web::Json(
        referrals.into_iter().map(DirectReferralEntry::from).collect(),
    ))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::{MockNetworkQuery, MockRegistrationCommand, MockCodeAdministration};
    use crate::domain::ports::FixtureAuthVerifier;
    use crate::domain::{Error, ReferralCode, UserId};
    use actix_web::{App, test as actix_test};
    use serde_json::Value;
    use std::sync::Arc;

    const TOKEN: &str = "Bearer dev:3fa85f64-5717-4562-b3fc-2c963f66afa6:+447700900123";

    fn state_with_network(network: MockNetworkQuery) -> HttpState {
        HttpState {
            auth: Arc::new(FixtureAuthVerifier),
            registration: Arc::new(MockRegistrationCommand::new()),
            network: Arc::new(network),
            admin: Arc::new(MockCodeAdministration::new()),
        }
    }

    async fn get_network(state: HttpState, uri: &str) -> actix_web::dev::ServiceResponse {
        let app = actix_test::init_service(
            App::new().app_data(web::Data::new(state)).service(
                web::scope("/api/v1")
                    .service(network_summary)
                    .service(list_direct_referrals),
            ),
        )
        .await;
        let request = actix_test::TestRequest::get()
            .uri(uri)
            .insert_header(("Authorization", TOKEN))
            .to_request();
        actix_test::call_service(&app, request).await
    }

    #[actix_web::test]
    async fn summary_serialises_camel_case_fields() {
        let mut network = MockNetworkQuery::new();
        network.expect_summary().times(1).return_once(|_| {
            Ok(NetworkSummary {
                referral_code: Some(ReferralCode::parse("TLW-ABC234").expect("valid code")),
                rank: Rank::Activist,
                direct_referrals: 2,
                team_size: 5,
                referred_by: Some(UserId::random()),
            })
        });

        let response = get_network(state_with_network(network), "/api/v1/network").await;
        assert!(response.status().is_success());
        let value: Value = actix_test::read_body_json(response).await;
        assert_eq!(
            value.get("referralCode").and_then(Value::as_str),
            Some("TLW-ABC234")
        );
        assert_eq!(value.get("rank").and_then(Value::as_str), Some("activist"));
        assert_eq!(value.get("tier").and_then(Value::as_u64), Some(2));
        assert_eq!(value.get("teamSize").and_then(Value::as_u64), Some(5));
        assert!(value.get("referredBy").is_some());
    }

    #[actix_web::test]
    async fn unregistered_caller_gets_not_found() {
        let mut network = MockNetworkQuery::new();
        network
            .expect_summary()
            .times(1)
            .return_once(|_| Err(Error::not_found("user is not registered")));

        let response = get_network(state_with_network(network), "/api/v1/network").await;
        assert_eq!(response.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn referral_listing_requires_a_token() {
        let network = MockNetworkQuery::new();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state_with_network(network)))
                .service(web::scope("/api/v1").service(list_direct_referrals)),
        )
        .await;
        let request = actix_test::TestRequest::get()
            .uri("/api/v1/network/referrals")
            .to_request();
        let response = actix_test::call_service(&app, request).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }
}
