//! Verified phone identity and its log-safe fingerprint.
//!
//! Registration callers are identified by a phone number verified upstream.
//! The raw number is personal data and must never reach logs or error
//! payloads; use [`PhoneNumber::fingerprint`] wherever the number needs to be
//! correlated.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Validation errors returned by [`PhoneNumber::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneValidationError {
    /// The input was empty.
    Empty,
    /// The number did not start with `+` (E.164 country code marker).
    MissingCountryCode,
    /// A character other than a digit followed the `+`.
    InvalidCharacter,
    /// Fewer digits than E.164 permits.
    TooShort {
        /// Minimum digit count.
        min: usize,
    },
    /// More digits than E.164 permits.
    TooLong {
        /// Maximum digit count.
        max: usize,
    },
}

impl fmt::Display for PhoneValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "phone number must not be empty"),
            Self::MissingCountryCode => write!(f, "phone number must start with a + country code"),
            Self::InvalidCharacter => write!(f, "phone number may only contain digits after +"),
            Self::TooShort { min } => write!(f, "phone number must have at least {min} digits"),
            Self::TooLong { max } => write!(f, "phone number must have at most {max} digits"),
        }
    }
}

impl std::error::Error for PhoneValidationError {}

/// Minimum digit count accepted after the `+`.
pub const PHONE_DIGITS_MIN: usize = 7;
/// Maximum digit count accepted after the `+` (E.164 bound).
pub const PHONE_DIGITS_MAX: usize = 15;

/// E.164 phone number, stored in canonical `+digits` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Validate and construct a [`PhoneNumber`].
    pub fn new(input: impl AsRef<str>) -> Result<Self, PhoneValidationError> {
        Self::from_owned(input.as_ref().trim().to_owned())
    }

    fn from_owned(input: String) -> Result<Self, PhoneValidationError> {
        if input.is_empty() {
            return Err(PhoneValidationError::Empty);
        }
        let Some(digits) = input.strip_prefix('+') else {
            return Err(PhoneValidationError::MissingCountryCode);
        };
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneValidationError::InvalidCharacter);
        }
        if digits.len() < PHONE_DIGITS_MIN {
            return Err(PhoneValidationError::TooShort {
                min: PHONE_DIGITS_MIN,
            });
        }
        if digits.len() > PHONE_DIGITS_MAX {
            return Err(PhoneValidationError::TooLong {
                max: PHONE_DIGITS_MAX,
            });
        }
        Ok(Self(input))
    }

    /// Stable, non-reversible fingerprint suitable for logs and metrics.
    pub fn fingerprint(&self) -> PhoneFingerprint {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut encoded = hex::encode(digest);
        encoded.truncate(PhoneFingerprint::LEN);
        PhoneFingerprint(encoded)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Truncated SHA-256 digest of a phone number.
///
/// Collisions are acceptable here: the fingerprint exists only for log
/// correlation, never for identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneFingerprint(String);

impl PhoneFingerprint {
    /// Hex characters retained from the digest.
    const LEN: usize = 16;
}

impl fmt::Display for PhoneFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
