//! Nine-tier network rank ladder and its progression rule.
//!
//! Advancement is dual-threshold: a tier is reached only when both the
//! direct-referral count and the cumulative team size meet that tier's
//! minimums. Evaluation is a pure function of the two counters; the
//! no-demotion rule (ranks never decrease) is enforced where counters are
//! mutated, not here.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Discrete rank in the nine-tier ladder.
///
/// Variant order is ascending, so the derived [`Ord`] matches tier order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    /// Tier 1: every registered user.
    Member,
    /// Tier 2.
    Activist,
    /// Tier 3.
    Organizer,
    /// Tier 4.
    Mobilizer,
    /// Tier 5.
    Coordinator,
    /// Tier 6.
    DistrictLead,
    /// Tier 7.
    RegionalLead,
    /// Tier 8.
    StateLead,
    /// Tier 9: top of the ladder.
    NationalLead,
}

/// Minimum counters required to hold a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankThreshold {
    /// Rank granted once both minimums are met.
    pub rank: Rank,
    /// Minimum direct-referral count.
    pub direct: u32,
    /// Minimum cumulative team size.
    pub team: u32,
}

/// The ladder, ascending. Both columns are monotonically increasing.
pub const LADDER: [RankThreshold; 9] = [
    RankThreshold {
        rank: Rank::Member,
        direct: 0,
        team: 0,
    },
    RankThreshold {
        rank: Rank::Activist,
        direct: 2,
        team: 5,
    },
    RankThreshold {
        rank: Rank::Organizer,
        direct: 5,
        team: 25,
    },
    RankThreshold {
        rank: Rank::Mobilizer,
        direct: 10,
        team: 100,
    },
    RankThreshold {
        rank: Rank::Coordinator,
        direct: 20,
        team: 500,
    },
    RankThreshold {
        rank: Rank::DistrictLead,
        direct: 35,
        team: 2_000,
    },
    RankThreshold {
        rank: Rank::RegionalLead,
        direct: 60,
        team: 8_000,
    },
    RankThreshold {
        rank: Rank::StateLead,
        direct: 100,
        team: 30_000,
    },
    RankThreshold {
        rank: Rank::NationalLead,
        direct: 150,
        team: 100_000,
    },
];

impl Rank {
    /// Highest rank whose direct and team thresholds are both met.
    ///
    /// Walks the ladder from the top down and returns the first qualifying
    /// tier, so a tie on thresholds resolves to the higher rank.
    #[must_use]
    pub fn evaluate(direct_referrals: u32, team_size: u32) -> Self {
        LADDER
            .iter()
            .rev()
            .find(|threshold| direct_referrals >= threshold.direct && team_size >= threshold.team)
            .map_or(Self::Member, |threshold| threshold.rank)
    }

    /// One-based tier number for display.
    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            Self::Member => 1,
            Self::Activist => 2,
            Self::Organizer => 3,
            Self::Mobilizer => 4,
            Self::Coordinator => 5,
            Self::DistrictLead => 6,
            Self::RegionalLead => 7,
            Self::StateLead => 8,
            Self::NationalLead => 9,
        }
    }

    /// Stable snake_case name, matching the serde representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Activist => "activist",
            Self::Organizer => "organizer",
            Self::Mobilizer => "mobilizer",
            Self::Coordinator => "coordinator",
            Self::DistrictLead => "district_lead",
            Self::RegionalLead => "regional_lead",
            Self::StateLead => "state_lead",
            Self::NationalLead => "national_lead",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse failures for stored rank names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankParseError {
    /// The unrecognised name.
    pub found: String,
}

impl std::fmt::Display for RankParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown rank name {:?}", self.found)
    }
}

impl std::error::Error for RankParseError {}

impl std::str::FromStr for Rank {
    type Err = RankParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LADDER
            .iter()
            .find(|threshold| threshold.rank.as_str() == s)
            .map(|threshold| threshold.rank)
            .ok_or_else(|| RankParseError { found: s.to_owned() })
    }
}
