//! Moderation API handlers.
//!
//! ```text
//! POST /api/v1/admin/codes/{code}/deactivate
//! ```
//!
//! Guarded by the moderation claim on the verified identity.

use actix_web::{HttpRequest, HttpResponse, post, web};
use serde_json::json;
use tracing::info;

use crate::domain::{Error, ReferralCode};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth;
use crate::inbound::http::state::HttpState;

/// Deactivate a referral code so future registrations with it fail.
#[utoipa::path(
    post,
    path = "/api/v1/admin/codes/{code}/deactivate",
    params(
        ("code" = String, Path, description = "Referral code to deactivate")
    ),
    responses(
        (status = 204, description = "Code deactivated (idempotent)"),
        (status = 400, description = "Malformed code", body = Error),
        (status = 401, description = "Missing or invalid bearer token", body = Error),
        (status = 403, description = "Caller lacks the moderation claim", body = Error),
        (status = 404, description = "Code is not registered", body = Error)
    ),
    tags = ["admin"],
    operation_id = "deactivateCode",
    security(("BearerToken" = []))
)]
#[post("/admin/codes/{code}/deactivate")]
pub async fn deactivate_code(
    state: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let caller = auth::require_admin(&state, &req).await?;
    let code = ReferralCode::parse(path.into_inner()).map_err(|err| {
        Error::invalid_format(err.to_string())
            .with_details(json!({ "field": "code", "code": "invalid_format" }))
    })?;
    state.admin.deactivate_code(&code).await?;
    info!(moderator = %caller.user_id, code = %code, "code deactivated by moderator");
    Ok(HttpResponse::NoContent().finish())
}
