//! Driving port resolving bearer tokens to verified phone identities.
//!
//! Phone verification happens in the identity provider, outside this
//! service. Inbound adapters hand the opaque bearer token to this port and
//! receive the caller's verified identity, keeping HTTP handlers free of
//! provider-specific plumbing and deterministic to test.

use async_trait::async_trait;

use crate::domain::{Error, PhoneNumber, UserId};

/// Identity attached to a verified call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCaller {
    /// Stable identity issued by the provider.
    pub user_id: UserId,
    /// The phone number the provider verified.
    pub phone: PhoneNumber,
    /// Whether the identity carries the moderation claim.
    pub admin: bool,
}

/// Domain use-case port for caller verification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Resolve a bearer token into a verified caller identity.
    async fn verify(&self, token: &str) -> Result<VerifiedCaller, Error>;
}

/// Development verifier used until the identity provider adapter lands.
///
/// Accepts tokens of the form `dev:<uuid>:<phone>` with an optional
/// `:admin` suffix and rejects everything else. Handy for local runs and
/// HTTP tests; never wire it in front of real traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAuthVerifier;

#[async_trait]
impl AuthVerifier for FixtureAuthVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedCaller, Error> {
        let mut parts = token.split(':');
        let (Some("dev"), Some(id), Some(phone)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::unauthorized("invalid bearer token"));
        };
        let admin = match parts.next() {
            None => false,
            Some("admin") => true,
            Some(_) => return Err(Error::unauthorized("invalid bearer token")),
        };
        if parts.next().is_some() {
            return Err(Error::unauthorized("invalid bearer token"));
        }
        let user_id =
            UserId::new(id).map_err(|err| Error::unauthorized(format!("invalid token id: {err}")))?;
        let phone = PhoneNumber::new(phone)
            .map_err(|err| Error::unauthorized(format!("invalid token phone: {err}")))?;
        Ok(VerifiedCaller {
            user_id,
            phone,
            admin,
        })
    }
}
