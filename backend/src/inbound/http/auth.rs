//! Bearer-token extraction for HTTP handlers.
//!
//! Handlers never see the raw `Authorization` header beyond this module:
//! they ask for a [`VerifiedCaller`] and receive either the verified
//! identity or a domain error already shaped for the response.

use actix_web::HttpRequest;
use actix_web::http::header;

use crate::domain::Error;
use crate::domain::ports::VerifiedCaller;

use super::state::HttpState;

/// Resolve the request's bearer token into a verified caller.
pub async fn require_caller(state: &HttpState, req: &HttpRequest) -> Result<VerifiedCaller, Error> {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Err(Error::unauthorized("missing bearer token"));
    };
    let value = value
        .to_str()
        .map_err(|_| Error::unauthorized("authorization header must be ASCII"))?;
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(Error::unauthorized("authorization scheme must be Bearer"));
    };
    state.auth.verify(token).await
}

/// Resolve the caller and require the moderation claim.
pub async fn require_admin(state: &HttpState, req: &HttpRequest) -> Result<VerifiedCaller, Error> {
    let caller = require_caller(state, req).await?;
    if !caller.admin {
        return Err(Error::forbidden("moderation claim required"));
    }
    Ok(caller)
}
