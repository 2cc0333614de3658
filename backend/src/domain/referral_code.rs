//! Referral code value object and candidate generation.
//!
//! Codes are shared by voice and handwriting, so the alphabet drops the
//! glyph pairs people misread: `0`/`O` and `1`/`I`. Input is normalised to
//! upper case before validation, making codes case-insensitive to type but
//! canonical in storage.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fixed prefix carried by every referral code.
pub const CODE_PREFIX: &str = "TLW-";
/// Number of alphabet characters following the prefix.
pub const CODE_SUFFIX_LEN: usize = 6;
/// Permitted suffix characters; excludes `0`, `O`, `1` and `I`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Candidate draws attempted before code allocation gives up.
pub const MAX_CODE_ATTEMPTS: u32 = 10;

/// Validation errors returned by [`ReferralCode::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralCodeParseError {
    /// The input was empty.
    Empty,
    /// The input did not start with [`CODE_PREFIX`].
    MissingPrefix,
    /// The suffix was not exactly [`CODE_SUFFIX_LEN`] characters.
    WrongLength {
        /// Suffix characters found.
        found: usize,
    },
    /// A suffix character fell outside [`CODE_ALPHABET`].
    DisallowedCharacter {
        /// Offending character after normalisation.
        found: char,
    },
}

impl fmt::Display for ReferralCodeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "referral code must not be empty"),
            Self::MissingPrefix => write!(f, "referral code must start with {CODE_PREFIX}"),
            Self::WrongLength { found } => write!(
                f,
                "referral code must have {CODE_SUFFIX_LEN} characters after the prefix, found {found}"
            ),
            Self::DisallowedCharacter { found } => {
                write!(f, "referral code contains disallowed character {found:?}")
            }
        }
    }
}

impl std::error::Error for ReferralCodeParseError {}

/// Short shareable identifier attributing a registration to its referrer.
///
/// ## Invariants
/// - Canonical form: [`CODE_PREFIX`] followed by exactly [`CODE_SUFFIX_LEN`]
///   characters drawn from [`CODE_ALPHABET`].
/// - Once assigned to a user the code never changes; deactivation is the only
///   permitted mutation, and it lives on the store record, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Normalise and validate a submitted code string.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, ReferralCodeParseError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ReferralCodeParseError::Empty);
        }
        let canonical = trimmed.to_ascii_uppercase();
        let Some(suffix) = canonical.strip_prefix(CODE_PREFIX) else {
            return Err(ReferralCodeParseError::MissingPrefix);
        };
        let found = suffix.chars().count();
        if found != CODE_SUFFIX_LEN {
            return Err(ReferralCodeParseError::WrongLength { found });
        }
        if let Some(bad) = suffix
            .chars()
            .find(|c| !c.is_ascii() || !CODE_ALPHABET.contains(&(*c as u8)))
        {
            return Err(ReferralCodeParseError::DisallowedCharacter { found: bad });
        }
        Ok(Self(canonical))
    }

    /// Canonical code string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for ReferralCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ReferralCode> for String {
    fn from(value: ReferralCode) -> Self {
        value.0
    }
}

impl TryFrom<String> for ReferralCode {
    type Error = ReferralCodeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Draw one candidate code from the restricted alphabet.
///
/// Uniqueness is not checked here; the registration transaction probes the
/// code store for each candidate and redraws on collision, up to
/// [`MAX_CODE_ATTEMPTS`].
pub fn generate_candidate<R: Rng + ?Sized>(rng: &mut R) -> ReferralCode {
    let mut code = String::with_capacity(CODE_PREFIX.len() + CODE_SUFFIX_LEN);
    code.push_str(CODE_PREFIX);
    for _ in 0..CODE_SUFFIX_LEN {
        let index = rng.gen_range(0..CODE_ALPHABET.len());
        code.push(char::from(CODE_ALPHABET[index]));
    }
    ReferralCode(code)
}
