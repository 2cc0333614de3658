//! Port abstraction for the transactional referral network store.
//!
//! The store holds three document families: user profiles, code-to-owner
//! mappings, and append-only referral events. Registration mutates all three
//! inside one optimistic transaction, modelled here as a [`NetworkSession`]:
//! reads observe a consistent snapshot, writes are buffered, and
//! [`NetworkSession::commit`] either applies everything or fails with
//! [`StoreError::Conflict`] when a concurrent transaction won the race.
//! Callers treat `Conflict` as retryable and re-run the whole session body.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DisplayName, ReferralCode, ReferralEvent, UserId, UserProfile};

use super::define_port_error;

define_port_error! {
    /// Errors raised by network store adapters.
    pub enum StoreError {
        /// Store connection could not be established.
        Connection => "network store connection failed: {message}",
        /// Read or write failed during execution.
        Query => "network store query failed: {message}",
        /// Optimistic commit lost against a concurrent transaction.
        Conflict => "network store commit conflict: {message}",
        /// Stored data violated a domain invariant while decoding.
        Corrupt => "network store returned corrupt data: {message}",
    }
}

/// Code-to-owner mapping held by the store.
///
/// Created once per user inside the registration transaction; immutable
/// afterwards except for `active`, which moderation may clear.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRecord {
    /// The canonical code string.
    pub code: ReferralCode,
    /// Identity the code attributes registrations to.
    pub owner: UserId,
    /// Inactive codes are rejected at validation time.
    pub active: bool,
    /// When the mapping was created.
    pub created_at: DateTime<Utc>,
}

/// One direct referral, as listed to the referrer.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectReferral {
    /// The referred user.
    pub id: UserId,
    /// Their display name.
    pub display_name: DisplayName,
    /// When they registered.
    pub joined_at: DateTime<Utc>,
}

/// Driven port for the referral network document store.
#[async_trait]
pub trait NetworkStore: Send + Sync {
    /// Open a transactional session with snapshot reads and atomic commit.
    async fn begin(&self) -> Result<Box<dyn NetworkSession>, StoreError>;

    /// Read a profile outside any transaction.
    async fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError>;

    /// List a user's direct referrals, newest first, at most `limit`.
    async fn direct_referrals(
        &self,
        id: &UserId,
        limit: u32,
    ) -> Result<Vec<DirectReferral>, StoreError>;

    /// List crediting events attributed to a referrer, newest first, at most
    /// `limit`.
    async fn events_for(
        &self,
        referrer: &UserId,
        limit: u32,
    ) -> Result<Vec<ReferralEvent>, StoreError>;
}

/// One all-or-nothing unit of work against the network store.
///
/// Dropping a session without calling [`NetworkSession::commit`] discards
/// every buffered write; no partial state can escape.
#[async_trait]
pub trait NetworkSession: Send {
    /// Read a profile within the session snapshot.
    async fn profile(&mut self, id: &UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Buffer a profile write.
    async fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError>;

    /// Read a code mapping within the session snapshot.
    async fn code_record(&mut self, code: &ReferralCode)
    -> Result<Option<CodeRecord>, StoreError>;

    /// Buffer a code mapping write.
    async fn put_code_record(&mut self, record: &CodeRecord) -> Result<(), StoreError>;

    /// Buffer an append-only event write.
    async fn put_event(&mut self, event: &ReferralEvent) -> Result<(), StoreError>;

    /// Atomically apply every buffered write.
    ///
    /// Fails with [`StoreError::Conflict`] when any document read by this
    /// session was modified by a transaction that committed first.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
