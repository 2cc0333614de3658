//! In-memory network store with optimistic commit-time conflict detection.
//!
//! Documents carry a version counter. A session pins the version of every
//! document at first read and buffers its writes; commit re-checks every
//! pinned version under the store lock and rejects the batch with
//! [`StoreError::Conflict`] when any of them moved. This mirrors the
//! semantics the PostgreSQL adapter gets from SERIALIZABLE isolation, which
//! keeps the registration service's retry loop honest in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{CodeRecord, DirectReferral, NetworkSession, NetworkStore, StoreError};
use crate::domain::{ReferralCode, ReferralEvent, UserId, UserProfile};

/// Version assigned to documents that do not exist yet.
const ABSENT: u64 = 0;

#[derive(Default)]
struct Shelf {
    profiles: HashMap<UserId, (u64, UserProfile)>,
    codes: HashMap<ReferralCode, (u64, CodeRecord)>,
    events: Vec<ReferralEvent>,
}

impl Shelf {
    fn profile_version(&self, id: &UserId) -> u64 {
        self.profiles.get(id).map_or(ABSENT, |(version, _)| *version)
    }

    fn code_version(&self, code: &ReferralCode) -> u64 {
        self.codes.get(code).map_or(ABSENT, |(version, _)| *version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DocKey {
    Profile(UserId),
    Code(ReferralCode),
}

impl std::fmt::Display for DocKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Profile(id) => write!(f, "profile {id}"),
            Self::Code(code) => write!(f, "code {code}"),
        }
    }
}

fn lock(shelf: &Arc<Mutex<Shelf>>) -> Result<MutexGuard<'_, Shelf>, StoreError> {
    shelf
        .lock()
        .map_err(|_| StoreError::query("store mutex poisoned"))
}

/// Process-local [`NetworkStore`] for tests and database-less runs.
#[derive(Default)]
pub struct InMemoryNetworkStore {
    shelf: Arc<Mutex<Shelf>>,
}

impl InMemoryNetworkStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NetworkStore for InMemoryNetworkStore {
    async fn begin(&self) -> Result<Box<dyn NetworkSession>, StoreError> {
        Ok(Box::new(InMemorySession {
            shelf: Arc::clone(&self.shelf),
            reads: HashMap::new(),
            profile_writes: HashMap::new(),
            code_writes: HashMap::new(),
            event_writes: Vec::new(),
        }))
    }

    async fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        let shelf = lock(&self.shelf)?;
        Ok(shelf.profiles.get(id).map(|(_, profile)| profile.clone()))
    }

    async fn direct_referrals(
        &self,
        id: &UserId,
        limit: u32,
    ) -> Result<Vec<DirectReferral>, StoreError> {
        let shelf = lock(&self.shelf)?;
        let mut referrals: Vec<DirectReferral> = shelf
            .profiles
            .values()
            .filter(|(_, profile)| profile.referred_by.as_ref() == Some(id))
            .map(|(_, profile)| DirectReferral {
                id: profile.id,
                display_name: profile.display_name.clone(),
                joined_at: profile.created_at,
            })
            .collect();
        referrals.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        referrals.truncate(limit as usize);
        Ok(referrals)
    }

    async fn events_for(
        &self,
        referrer: &UserId,
        limit: u32,
    ) -> Result<Vec<ReferralEvent>, StoreError> {
        let shelf = lock(&self.shelf)?;
        let mut events: Vec<ReferralEvent> = shelf
            .events
            .iter()
            .filter(|event| event.referrer == *referrer)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(limit as usize);
        Ok(events)
    }
}

/// Buffered unit of work over [`InMemoryNetworkStore`].
///
/// Reads pin the first-observed version of each document; writes stay in the
/// buffer until [`NetworkSession::commit`] validates every pinned version
/// and applies the batch under the store lock. Dropping the session loses
/// the buffer, so no partial state can escape.
struct InMemorySession {
    shelf: Arc<Mutex<Shelf>>,
    reads: HashMap<DocKey, u64>,
    profile_writes: HashMap<UserId, UserProfile>,
    code_writes: HashMap<ReferralCode, CodeRecord>,
    event_writes: Vec<ReferralEvent>,
}

#[async_trait]
impl NetworkSession for InMemorySession {
    async fn profile(&mut self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        if let Some(buffered) = self.profile_writes.get(id) {
            return Ok(Some(buffered.clone()));
        }
        let shelf = lock(&self.shelf)?;
        let version = shelf.profile_version(id);
        self.reads.entry(DocKey::Profile(*id)).or_insert(version);
        Ok(shelf.profiles.get(id).map(|(_, profile)| profile.clone()))
    }

    async fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        self.profile_writes.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn code_record(
        &mut self,
        code: &ReferralCode,
    ) -> Result<Option<CodeRecord>, StoreError> {
        if let Some(buffered) = self.code_writes.get(code) {
            return Ok(Some(buffered.clone()));
        }
        let shelf = lock(&self.shelf)?;
        let version = shelf.code_version(code);
        self.reads
            .entry(DocKey::Code(code.clone()))
            .or_insert(version);
        Ok(shelf.codes.get(code).map(|(_, record)| record.clone()))
    }

    async fn put_code_record(&mut self, record: &CodeRecord) -> Result<(), StoreError> {
        self.code_writes.insert(record.code.clone(), record.clone());
        Ok(())
    }

    async fn put_event(&mut self, event: &ReferralEvent) -> Result<(), StoreError> {
        self.event_writes.push(event.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut shelf = lock(&self.shelf)?;
        for (key, pinned) in &self.reads {
            let current = match key {
                DocKey::Profile(id) => shelf.profile_version(id),
                DocKey::Code(code) => shelf.code_version(code),
            };
            if current != *pinned {
                return Err(StoreError::conflict(format!(
                    "{key} changed between read and commit"
                )));
            }
        }
        for (id, profile) in self.profile_writes {
            let entry = shelf.profiles.entry(id).or_insert((ABSENT, profile.clone()));
            let version = entry.0 + 1;
            *entry = (version, profile);
        }
        for (code, record) in self.code_writes {
            let entry = shelf.codes.entry(code).or_insert((ABSENT, record.clone()));
            let version = entry.0 + 1;
            *entry = (version, record);
        }
        shelf.events.extend(self.event_writes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{DisplayName, PhoneNumber, Rank};
    use chrono::Utc;

    fn profile(id: UserId) -> UserProfile {
        UserProfile::new(
            id,
            PhoneNumber::new("+2348012345678").expect("valid phone"),
            DisplayName::new("Ada Lovelace").expect("valid name"),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn committed_writes_become_visible() {
        let store = InMemoryNetworkStore::new();
        let id = UserId::random();
        let mut tx = store.begin().await.expect("begin");
        tx.put_profile(&profile(id)).await.expect("buffer write");
        tx.commit().await.expect("commit");

        let stored = store.profile(&id).await.expect("read back");
        assert_eq!(stored.map(|p| p.id), Some(id));
    }

    #[tokio::test]
    async fn dropped_session_leaves_no_trace() {
        let store = InMemoryNetworkStore::new();
        let id = UserId::random();
        {
            let mut tx = store.begin().await.expect("begin");
            tx.put_profile(&profile(id)).await.expect("buffer write");
            // No commit: the buffer dies with the session.
        }
        assert!(store.profile(&id).await.expect("read back").is_none());
    }

    #[tokio::test]
    async fn session_reads_its_own_buffered_writes() {
        let store = InMemoryNetworkStore::new();
        let id = UserId::random();
        let mut tx = store.begin().await.expect("begin");
        tx.put_profile(&profile(id)).await.expect("buffer write");
        let seen = tx.profile(&id).await.expect("read buffered");
        assert_eq!(seen.map(|p| p.id), Some(id));
    }

    #[tokio::test]
    async fn second_committer_conflicts_on_shared_document() {
        let store = InMemoryNetworkStore::new();
        let id = UserId::random();
        let mut seed = store.begin().await.expect("begin seed");
        seed.put_profile(&profile(id)).await.expect("buffer write");
        seed.commit().await.expect("commit seed");

        let mut first = store.begin().await.expect("begin first");
        let mut second = store.begin().await.expect("begin second");

        let mut from_first = first
            .profile(&id)
            .await
            .expect("first read")
            .expect("profile exists");
        let mut from_second = second
            .profile(&id)
            .await
            .expect("second read")
            .expect("profile exists");

        from_first.direct_referrals += 1;
        first.put_profile(&from_first).await.expect("buffer first");
        first.commit().await.expect("first commit wins");

        from_second.direct_referrals += 1;
        second
            .put_profile(&from_second)
            .await
            .expect("buffer second");
        let error = second.commit().await.expect_err("second commit conflicts");
        assert!(matches!(error, StoreError::Conflict { .. }));

        // The winning increment survived; the loser left no trace.
        let stored = store
            .profile(&id)
            .await
            .expect("read back")
            .expect("profile exists");
        assert_eq!(stored.direct_referrals, 1);
        assert_eq!(stored.rank, Rank::Member);
    }

    #[tokio::test]
    async fn absent_documents_participate_in_conflict_detection() {
        let store = InMemoryNetworkStore::new();
        let id = UserId::random();

        // Both sessions observe the profile as absent.
        let mut first = store.begin().await.expect("begin first");
        let mut second = store.begin().await.expect("begin second");
        assert!(first.profile(&id).await.expect("first read").is_none());
        assert!(second.profile(&id).await.expect("second read").is_none());

        first.put_profile(&profile(id)).await.expect("buffer first");
        first.commit().await.expect("first commit wins");

        second
            .put_profile(&profile(id))
            .await
            .expect("buffer second");
        let error = second.commit().await.expect_err("second commit conflicts");
        assert!(matches!(error, StoreError::Conflict { .. }));
    }
}
