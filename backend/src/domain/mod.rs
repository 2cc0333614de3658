//! Domain primitives, aggregates, and services for the referral network.
//!
//! Purpose: hold every transport-agnostic rule of registration, crediting,
//! and rank progression. Types are strongly validated at construction and
//! document their invariants and serde contracts in Rustdoc. Infrastructure
//! is reached only through the traits in [`ports`].

pub mod error;
pub mod phone;
pub mod ports;
pub mod rank;
pub mod referral_code;
pub mod referral_event;
pub mod registration;
pub mod trace_id;
pub mod user;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::phone::{PhoneFingerprint, PhoneNumber, PhoneValidationError};
pub use self::rank::{LADDER, Rank, RankThreshold};
pub use self::referral_code::{ReferralCode, ReferralCodeParseError};
pub use self::referral_event::ReferralEvent;
pub use self::registration::RegistrationService;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{DisplayName, UserId, UserProfile, UserValidationError};

/// Convenient result alias for domain operations.
pub type ApiResult<T> = Result<T, Error>;

#[cfg(test)]
mod registration_tests;
