//! Driving ports for registration, network queries, and code moderation.
//!
//! Inbound adapters call these ports without knowing the backing store.
//! Format validation of submitted codes happens at the adapter boundary
//! (the [`crate::domain::ReferralCode`] type cannot hold a malformed code),
//! so the ports traffic in typed values only.

use async_trait::async_trait;

use crate::domain::{DisplayName, Error, PhoneNumber, Rank, ReferralCode, UserId};

use super::DirectReferral;

/// Input to the registration entry point.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Verified identity of the registering user.
    pub user_id: UserId,
    /// Verified phone identity.
    pub phone: PhoneNumber,
    /// Profile display name.
    pub display_name: DisplayName,
    /// Referral code the user submitted, if any.
    pub referral_code: Option<ReferralCode>,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOutcome {
    /// The user's own code, freshly allocated or carried over on retry.
    pub referral_code: ReferralCode,
    /// The user's rank after the transaction.
    pub rank: Rank,
    /// Referrer credited by this invocation, when a valid code was submitted
    /// and the idempotency guard had not already tripped.
    pub credited_referrer: Option<UserId>,
    /// True when a submitted valid code did not credit because this user was
    /// already linked to a referrer (idempotent retry).
    pub replayed: bool,
}

/// Domain use-case port for the registration entry point.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrationCommand: Send + Sync {
    /// Run the atomic registration transaction.
    async fn register(&self, request: RegistrationRequest) -> Result<RegistrationOutcome, Error>;
}

/// Read-only summary of a caller's position in the network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSummary {
    /// The caller's own shareable code.
    pub referral_code: Option<ReferralCode>,
    /// Current rank.
    pub rank: Rank,
    /// Direct referral count.
    pub direct_referrals: u32,
    /// Cumulative downstream team size.
    pub team_size: u32,
    /// Immediate referrer, when one exists.
    pub referred_by: Option<UserId>,
}

/// Domain use-case port for network visibility queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkQuery: Send + Sync {
    /// Summarise the caller's own network position.
    async fn summary(&self, user_id: &UserId) -> Result<NetworkSummary, Error>;

    /// List the caller's direct referrals, newest first.
    async fn direct_referrals(&self, user_id: &UserId) -> Result<Vec<DirectReferral>, Error>;
}

/// Domain use-case port for moderation of referral codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeAdministration: Send + Sync {
    /// Mark a code inactive so future registrations with it are rejected.
    async fn deactivate_code(&self, code: &ReferralCode) -> Result<(), Error>;
}
