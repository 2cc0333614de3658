//! Registration API handler.
//!
//! ```text
//! POST /api/v1/register {"displayName":"Ada Lovelace","referralCode":"TLW-7KQ2MF"}
//! ```
//!
//! The caller's identity comes from the verified bearer token, never from
//! the body; the referral code is an opaque string validated here before the
//! domain sees it.

use actix_web::{HttpRequest, HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::ports::{RegistrationOutcome, RegistrationRequest};
use crate::domain::{
    DisplayName, Error, Rank, ReferralCode, ReferralCodeParseError, UserValidationError,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth;
use crate::inbound::http::state::HttpState;

/// Registration request body for `POST /api/v1/register`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequestBody {
    /// Name shown to other members.
    pub display_name: String,
    /// Optional referral code attributing this registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

/// Successful registration response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// The caller's own shareable code.
    #[schema(example = "TLW-7KQ2MF")]
    pub referral_code: String,
    /// Rank after the transaction.
    pub rank: Rank,
    /// One-based tier number of `rank`.
    pub tier: u8,
    /// Whether this invocation credited a referrer.
    pub credited: bool,
    /// Whether a submitted code was ignored because this user was already
    /// credited (idempotent retry).
    pub replayed: bool,
}

impl From<RegistrationOutcome> for RegisterResponse {
    fn from(value: RegistrationOutcome) -> Self {
        Self {
            referral_code: value.referral_code.to_string(),
            tier: value.rank.tier(),
            rank: value.rank,
            credited: value.credited_referrer.is_some(),
            replayed: value.replayed,
        }
    }
}

fn map_display_name_error(err: UserValidationError) -> Error {
    Error::invalid_request(err.to_string())
        .with_details(json!({ "field": "displayName", "code": "invalid_display_name" }))
}

fn map_code_parse_error(err: ReferralCodeParseError) -> Error {
    Error::invalid_format(err.to_string())
        .with_details(json!({ "field": "referralCode", "code": "invalid_format" }))
}

/// Register the verified caller, optionally crediting a referrer.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequestBody,
    responses(
        (status = 200, description = "Registration committed", body = RegisterResponse),
        (status = 400, description = "Malformed display name, malformed code, or self-referral", body = Error),
        (status = 401, description = "Missing or invalid bearer token", body = Error),
        (status = 404, description = "Referral code is not registered", body = Error),
        (status = 409, description = "Referral code has been deactivated", body = Error),
        (status = 503, description = "Transient contention or exhausted code allocation; retry", body = Error)
    ),
    tags = ["registration"],
    operation_id = "register",
    security(("BearerToken" = []))
)]
#[post("/register")]
pub async fn register(
    state: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<RegisterRequestBody>,
) -> ApiResult<HttpResponse> {
    let caller = auth::require_caller(&state, &req).await?;
    let body = payload.into_inner();
    let display_name = DisplayName::new(body.display_name).map_err(map_display_name_error)?;
    let referral_code = body
        .referral_code
        .map(|raw| ReferralCode::parse(raw).map_err(map_code_parse_error))
        .transpose()?;

    let outcome = state
        .registration
        .register(RegistrationRequest {
            user_id: caller.user_id,
            phone: caller.phone,
            display_name,
            referral_code,
        })
        .await?;
    Ok(HttpResponse::Ok().json(RegisterResponse::from(outcome)))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::RegistrationService;
    use crate::domain::ports::FixtureAuthVerifier;
    use crate::inbound::http::network::{list_direct_referrals, network_summary};
    use crate::outbound::memory::InMemoryNetworkStore;
    use actix_web::{App, test as actix_test};
    use mockable::DefaultClock;
    use serde_json::Value;
    use std::sync::Arc;
    use uuid::Uuid;

    fn test_state() -> HttpState {
        let service = Arc::new(RegistrationService::new(
            Arc::new(InMemoryNetworkStore::new()),
            Arc::new(DefaultClock),
        ));
        HttpState::for_service(service, Arc::new(FixtureAuthVerifier))
    }

    fn test_app(
        state: HttpState,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new().app_data(web::Data::new(state)).service(
            web::scope("/api/v1")
                .service(register)
                .service(network_summary)
                .service(list_direct_referrals),
        )
    }

    fn bearer_for(user: Uuid, phone: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer dev:{user}:{phone}"))
    }

    fn register_request(user: Uuid, body: &Value) -> actix_http::Request {
        actix_test::TestRequest::post()
            .uri("/api/v1/register")
            .insert_header(bearer_for(user, "+447700900123"))
            .set_json(body)
            .to_request()
    }

    #[actix_web::test]
    async fn register_returns_the_assigned_code() {
        let app = actix_test::init_service(test_app(test_state())).await;
        let body = serde_json::json!({ "displayName": "Ada Lovelace" });
        let response =
            actix_test::call_service(&app, register_request(Uuid::new_v4(), &body)).await;
        assert!(response.status().is_success());
        let value: Value = actix_test::read_body_json(response).await;
        let code = value
            .get("referralCode")
            .and_then(Value::as_str)
            .expect("code present");
        assert!(code.starts_with("TLW-"));
        assert_eq!(value.get("rank").and_then(Value::as_str), Some("member"));
        assert_eq!(value.get("tier").and_then(Value::as_u64), Some(1));
        assert_eq!(value.get("credited").and_then(Value::as_bool), Some(false));
    }

    #[actix_web::test]
    async fn register_without_token_is_unauthorized() {
        let app = actix_test::init_service(test_app(test_state())).await;
        let request = actix_test::TestRequest::post()
            .uri("/api/v1/register")
            .set_json(serde_json::json!({ "displayName": "Ada Lovelace" }))
            .to_request();
        let response = actix_test::call_service(&app, request).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn malformed_code_is_rejected_with_invalid_format() {
        let app = actix_test::init_service(test_app(test_state())).await;
        let body = serde_json::json!({ "displayName": "Ada Lovelace", "referralCode": "nope" });
        let response =
            actix_test::call_service(&app, register_request(Uuid::new_v4(), &body)).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::BAD_REQUEST);
        let value: Value = actix_test::read_body_json(response).await;
        assert_eq!(
            value.get("code").and_then(Value::as_str),
            Some("invalid_format")
        );
    }

    #[actix_web::test]
    async fn unknown_code_is_rejected_with_not_found() {
        let app = actix_test::init_service(test_app(test_state())).await;
        let body =
            serde_json::json!({ "displayName": "Ada Lovelace", "referralCode": "TLW-ZZZ999" });
        let response =
            actix_test::call_service(&app, register_request(Uuid::new_v4(), &body)).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::NOT_FOUND);
        let value: Value = actix_test::read_body_json(response).await;
        assert_eq!(value.get("code").and_then(Value::as_str), Some("not_found"));
    }

    #[actix_web::test]
    async fn referral_flow_credits_and_surfaces_in_the_summary() {
        let app = actix_test::init_service(test_app(test_state())).await;
        let referrer = Uuid::new_v4();

        let body = serde_json::json!({ "displayName": "Ada Lovelace" });
        let response = actix_test::call_service(&app, register_request(referrer, &body)).await;
        let value: Value = actix_test::read_body_json(response).await;
        let code = value
            .get("referralCode")
            .and_then(Value::as_str)
            .expect("code present")
            .to_owned();

        let body = serde_json::json!({ "displayName": "Grace Hopper", "referralCode": code });
        let response =
            actix_test::call_service(&app, register_request(Uuid::new_v4(), &body)).await;
        assert!(response.status().is_success());
        let value: Value = actix_test::read_body_json(response).await;
        assert_eq!(value.get("credited").and_then(Value::as_bool), Some(true));

        let request = actix_test::TestRequest::get()
            .uri("/api/v1/network")
            .insert_header(bearer_for(referrer, "+447700900123"))
            .to_request();
        let response = actix_test::call_service(&app, request).await;
        assert!(response.status().is_success());
        let value: Value = actix_test::read_body_json(response).await;
        assert_eq!(value.get("directReferrals").and_then(Value::as_u64), Some(1));
        assert_eq!(value.get("teamSize").and_then(Value::as_u64), Some(1));
    }
}
