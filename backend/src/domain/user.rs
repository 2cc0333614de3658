//! User identity and network profile.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{PhoneNumber, Rank, ReferralCode};

/// Validation errors returned by the user value objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    /// The identifier string was empty.
    EmptyId,
    /// The identifier string was not a valid UUID.
    InvalidId,
    /// The display name was empty once trimmed.
    EmptyDisplayName,
    /// The display name was shorter than the minimum.
    DisplayNameTooShort {
        /// Minimum character count.
        min: usize,
    },
    /// The display name was longer than the maximum.
    DisplayNameTooLong {
        /// Maximum character count.
        max: usize,
    },
    /// The display name contained a disallowed character.
    DisplayNameInvalidCharacters,
}

impl fmt::Display for UserValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "user id must not be empty"),
            Self::InvalidId => write!(f, "user id must be a valid UUID"),
            Self::EmptyDisplayName => write!(f, "display name must not be empty"),
            Self::DisplayNameTooShort { min } => {
                write!(f, "display name must be at least {min} characters")
            }
            Self::DisplayNameTooLong { max } => {
                write!(f, "display name must be at most {max} characters")
            }
            Self::DisplayNameInvalidCharacters => write!(
                f,
                "display name may only contain letters, numbers, spaces, hyphens, or apostrophes",
            ),
        }
    }
}

impl std::error::Error for UserValidationError {}

/// Stable user identifier issued by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Validate and construct a [`UserId`] from string input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let raw = id.as_ref();
        if raw.is_empty() {
            return Err(UserValidationError::EmptyId);
        }
        if raw.trim() != raw {
            return Err(UserValidationError::InvalidId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| UserValidationError::InvalidId)
    }

    /// Wrap an already-validated UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random [`UserId`].
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimum allowed length for a display name.
pub const DISPLAY_NAME_MIN: usize = 3;
/// Maximum allowed length for a display name.
pub const DISPLAY_NAME_MAX: usize = 48;

/// Human readable display name for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate and construct a [`DisplayName`] from owned input.
    pub fn new(display_name: impl Into<String>) -> Result<Self, UserValidationError> {
        Self::from_owned(display_name.into())
    }

    fn from_owned(display_name: String) -> Result<Self, UserValidationError> {
        if display_name.trim().is_empty() {
            return Err(UserValidationError::EmptyDisplayName);
        }

        let length = display_name.chars().count();
        if length < DISPLAY_NAME_MIN {
            return Err(UserValidationError::DisplayNameTooShort {
                min: DISPLAY_NAME_MIN,
            });
        }
        if length > DISPLAY_NAME_MAX {
            return Err(UserValidationError::DisplayNameTooLong {
                max: DISPLAY_NAME_MAX,
            });
        }

        let allowed =
            |c: char| c.is_alphanumeric() || c == ' ' || c == '_' || c == '-' || c == '\'';
        if !display_name.chars().all(allowed) {
            return Err(UserValidationError::DisplayNameInvalidCharacters);
        }

        Ok(Self(display_name))
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<DisplayName> for String {
    fn from(value: DisplayName) -> Self {
        value.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// A user's profile document in the referral network.
///
/// ## Invariants
/// - `referral_code`, once assigned, never changes.
/// - `referred_by` is never the user's own id, and once set it never changes;
///   its presence is the idempotency marker guarding against double-crediting.
/// - `upline` lists ancestor identities nearest-first; its head equals
///   `referred_by` whenever that link is set.
/// - `rank` never decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Stable identity from the identity provider.
    pub id: UserId,
    /// Verified phone identity.
    pub phone: PhoneNumber,
    /// Name shown to other members.
    pub display_name: DisplayName,
    /// The user's own shareable code; `None` only before first registration
    /// completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<ReferralCode>,
    /// Immediate referrer, when this user registered under a code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<UserId>,
    /// Materialised ancestor chain, nearest-first.
    pub upline: Vec<UserId>,
    /// Users who registered directly under this user's code.
    pub direct_referrals: u32,
    /// Cumulative count of users anywhere downstream.
    pub team_size: u32,
    /// Current rank in the nine-tier ladder.
    pub rank: Rank,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Fresh profile for a first-time registrant: no links, zero counters,
    /// bottom rank.
    #[must_use]
    pub fn new(
        id: UserId,
        phone: PhoneNumber,
        display_name: DisplayName,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            phone,
            display_name,
            referral_code: None,
            referred_by: None,
            upline: Vec::new(),
            direct_referrals: 0,
            team_size: 0,
            rank: Rank::Member,
            created_at,
        }
    }

    /// Whether this user has already been credited to a referrer.
    #[must_use]
    pub fn has_referrer(&self) -> bool {
        self.referred_by.is_some()
    }
}
