//! Immutable record of one successful crediting action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ReferralCode, UserId};

/// Analytics record written once per registration-with-code.
///
/// Events are append-only: never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// User whose code was used.
    pub referrer: UserId,
    /// User who registered under the code.
    pub new_user: UserId,
    /// The code that attributed the registration.
    pub code: ReferralCode,
    /// When the crediting transaction committed.
    pub occurred_at: DateTime<Utc>,
}

impl ReferralEvent {
    /// Record a crediting action with a fresh event identifier.
    #[must_use]
    pub fn record(
        referrer: UserId,
        new_user: UserId,
        code: ReferralCode,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            referrer,
            new_user,
            code,
            occurred_at,
        }
    }
}
