//! Registration, network-query, and code-moderation domain services.
//!
//! [`RegistrationService`] implements the driving ports on top of the
//! [`NetworkStore`] port. The registration body is written as a pure
//! function of its inputs and the session snapshot: every read and write
//! goes through one [`NetworkSession`], commit conflicts abort the body, and
//! the service re-runs it from a fresh snapshot. Crediting is guarded by the
//! referrer link on the registrant's profile, which makes the whole
//! operation safe to re-drive after client or platform retries.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::ports::{
    CodeAdministration, CodeRecord, DirectReferral, NetworkQuery, NetworkSession, NetworkStore,
    NetworkSummary, RegistrationCommand, RegistrationOutcome, RegistrationRequest, StoreError,
};
use crate::domain::referral_code::MAX_CODE_ATTEMPTS;
use crate::domain::{Error, Rank, ReferralCode, ReferralEvent, UserId, UserProfile, referral_code};

/// Commit attempts before a contended operation gives up.
///
/// Under fan-in contention on one referrer at least one transaction commits
/// per round, so the bound caps queue depth rather than forward progress.
const MAX_COMMIT_ATTEMPTS: u32 = 16;

/// Page bound for direct referral listings.
const DIRECT_REFERRALS_PAGE: u32 = 50;

/// Outcome of one transaction attempt, before retry classification.
enum AttemptError {
    /// Store failure; `Conflict` is retried, the rest surface.
    Store(StoreError),
    /// Domain failure; never retried.
    Domain(Error),
}

impl From<StoreError> for AttemptError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Referral network service implementing the driving ports.
pub struct RegistrationService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for RegistrationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S> RegistrationService<S> {
    /// Create a new service over the given store.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

/// Re-evaluate a profile's rank after a counter change.
///
/// Ranks are monotonic: a lower evaluation result is ignored.
fn promote(profile: &mut UserProfile) {
    let evaluated = Rank::evaluate(profile.direct_referrals, profile.team_size);
    if evaluated > profile.rank {
        debug!(user = %profile.id, from = %profile.rank, to = %evaluated, "rank promoted");
        profile.rank = evaluated;
    }
}

impl<S> RegistrationService<S>
where
    S: NetworkStore,
{
    fn map_store_error(error: StoreError) -> Error {
        match error {
            StoreError::Connection { message } => {
                Error::service_unavailable(format!("network store unavailable: {message}"))
            }
            StoreError::Conflict { message } => {
                Error::service_unavailable(format!("network store contention: {message}"))
            }
            StoreError::Query { message } => {
                Error::internal(format!("network store error: {message}"))
            }
            StoreError::Corrupt { message } => {
                Error::internal(format!("network store corruption: {message}"))
            }
        }
    }

    /// Validate the submitted code against the session snapshot.
    ///
    /// Pure reads only; every rejection carries the stable code the
    /// registration contract promises.
    async fn resolve_referrer(
        &self,
        tx: &mut dyn NetworkSession,
        code: &ReferralCode,
        registrant: UserId,
    ) -> Result<CodeRecord, AttemptError> {
        let Some(record) = tx.code_record(code).await? else {
            return Err(AttemptError::Domain(
                Error::not_found("referral code is not registered")
                    .with_details(json!({ "referralCode": code.as_str() })),
            ));
        };
        if !record.active {
            return Err(AttemptError::Domain(
                Error::inactive("referral code has been deactivated")
                    .with_details(json!({ "referralCode": code.as_str() })),
            ));
        }
        if record.owner == registrant {
            return Err(AttemptError::Domain(
                Error::self_referral("a user cannot register under their own referral code")
                    .with_details(json!({ "referralCode": code.as_str() })),
            ));
        }
        Ok(record)
    }

    /// Draw candidates until one is free in the code store, then claim it.
    async fn allocate_code(
        &self,
        tx: &mut dyn NetworkSession,
        owner: UserId,
    ) -> Result<ReferralCode, AttemptError> {
        let mut rng = SmallRng::from_entropy();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = referral_code::generate_candidate(&mut rng);
            if tx.code_record(&candidate).await?.is_none() {
                tx.put_code_record(&CodeRecord {
                    code: candidate.clone(),
                    owner,
                    active: true,
                    created_at: self.clock.utc(),
                })
                .await?;
                return Ok(candidate);
            }
            debug!(owner = %owner, "referral code candidate collided; redrawing");
        }
        Err(AttemptError::Domain(Error::service_unavailable(format!(
            "no unique referral code found in {MAX_CODE_ATTEMPTS} attempts; retry registration"
        ))))
    }

    /// One attempt at the atomic registration transaction.
    async fn try_register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationOutcome, AttemptError> {
        let mut tx = self.store.begin().await?;

        let resolved = match &request.referral_code {
            Some(code) => Some(
                self.resolve_referrer(tx.as_mut(), code, request.user_id)
                    .await?,
            ),
            None => None,
        };

        let mut profile = match tx.profile(&request.user_id).await? {
            Some(mut current) => {
                // Create-or-merge: retries refresh the mutable profile
                // fields, never the referral state.
                current.phone = request.phone.clone();
                current.display_name = request.display_name.clone();
                current
            }
            None => UserProfile::new(
                request.user_id,
                request.phone.clone(),
                request.display_name.clone(),
                self.clock.utc(),
            ),
        };

        let mut credited_referrer = None;
        let mut replayed = false;
        if let Some(record) = resolved {
            if profile.has_referrer() {
                // Idempotency guard: this user was already credited to a
                // referrer; re-crediting would double-count.
                replayed = true;
            } else {
                credited_referrer = Some(
                    self.credit_referrer(tx.as_mut(), &mut profile, record)
                        .await?,
                );
            }
        }

        let referral_code = match profile.referral_code.clone() {
            Some(code) => code,
            None => {
                let code = self.allocate_code(tx.as_mut(), request.user_id).await?;
                profile.referral_code = Some(code.clone());
                code
            }
        };

        tx.put_profile(&profile).await?;
        tx.commit().await?;

        Ok(RegistrationOutcome {
            referral_code,
            rank: profile.rank,
            credited_referrer,
            replayed,
        })
    }

    /// Link the registrant, credit the referrer, fan the team-size increment
    /// out over the ancestor chain, and record the event.
    async fn credit_referrer(
        &self,
        tx: &mut dyn NetworkSession,
        profile: &mut UserProfile,
        record: CodeRecord,
    ) -> Result<UserId, AttemptError> {
        let mut referrer = tx.profile(&record.owner).await?.ok_or_else(|| {
            AttemptError::Store(StoreError::corrupt(format!(
                "code {} is owned by missing profile {}",
                record.code, record.owner
            )))
        })?;

        if referrer.upline.contains(&profile.id) {
            // Crediting would make the registrant their own ancestor; this
            // can only happen via retroactive attachment below a descendant.
            return Err(AttemptError::Domain(
                Error::self_referral("referral code owner is downstream of this user")
                    .with_details(json!({ "referralCode": record.code.as_str() })),
            ));
        }

        profile.referred_by = Some(record.owner);
        profile.upline = std::iter::once(record.owner)
            .chain(referrer.upline.iter().copied())
            .collect();

        // Every remaining ancestor gains one team member.
        for ancestor_id in referrer.upline.clone() {
            let mut ancestor = tx.profile(&ancestor_id).await?.ok_or_else(|| {
                AttemptError::Store(StoreError::corrupt(format!(
                    "upline of {} references missing profile {ancestor_id}",
                    referrer.id
                )))
            })?;
            ancestor.team_size += 1;
            promote(&mut ancestor);
            tx.put_profile(&ancestor).await?;
        }

        referrer.direct_referrals += 1;
        referrer.team_size += 1;
        promote(&mut referrer);
        tx.put_profile(&referrer).await?;

        let event = ReferralEvent::record(
            record.owner,
            profile.id,
            record.code.clone(),
            self.clock.utc(),
        );
        tx.put_event(&event).await?;

        Ok(record.owner)
    }

    /// One attempt at deactivating a code.
    async fn try_deactivate(&self, code: &ReferralCode) -> Result<(), AttemptError> {
        let mut tx = self.store.begin().await?;
        let Some(record) = tx.code_record(code).await? else {
            return Err(AttemptError::Domain(
                Error::not_found("referral code is not registered")
                    .with_details(json!({ "referralCode": code.as_str() })),
            ));
        };
        if record.active {
            tx.put_code_record(&CodeRecord {
                active: false,
                ..record
            })
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Drive `body` until it commits, retrying only on commit conflicts.
    async fn run_with_retries<T, F, Fut>(&self, operation: &str, body: F) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, AttemptError>>,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            match body().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Store(StoreError::Conflict { message })) => {
                    debug!(operation, attempt, %message, "commit conflicted; retrying");
                }
                Err(AttemptError::Store(error)) => return Err(Self::map_store_error(error)),
                Err(AttemptError::Domain(error)) => return Err(error),
            }
        }
        warn!(operation, attempts = MAX_COMMIT_ATTEMPTS, "giving up after repeated conflicts");
        Err(Error::service_unavailable(
            "operation kept conflicting with concurrent commits; safe to retry",
        ))
    }
}

#[async_trait]
impl<S> RegistrationCommand for RegistrationService<S>
where
    S: NetworkStore,
{
    async fn register(&self, request: RegistrationRequest) -> Result<RegistrationOutcome, Error> {
        let outcome = self
            .run_with_retries("register", || self.try_register(&request))
            .await?;
        info!(
            user = %request.user_id,
            phone = %request.phone.fingerprint(),
            code = %outcome.referral_code,
            rank = %outcome.rank,
            credited = outcome.credited_referrer.is_some(),
            replayed = outcome.replayed,
            "registration committed"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl<S> NetworkQuery for RegistrationService<S>
where
    S: NetworkStore,
{
    async fn summary(&self, user_id: &UserId) -> Result<NetworkSummary, Error> {
        let profile = self
            .store
            .profile(user_id)
            .await
            .map_err(Self::map_store_error)?
            .ok_or_else(|| Error::not_found("user is not registered"))?;
        Ok(NetworkSummary {
            referral_code: profile.referral_code,
            rank: profile.rank,
            direct_referrals: profile.direct_referrals,
            team_size: profile.team_size,
            referred_by: profile.referred_by,
        })
    }

    async fn direct_referrals(&self, user_id: &UserId) -> Result<Vec<DirectReferral>, Error> {
        self.store
            .direct_referrals(user_id, DIRECT_REFERRALS_PAGE)
            .await
            .map_err(Self::map_store_error)
    }
}

#[async_trait]
impl<S> CodeAdministration for RegistrationService<S>
where
    S: NetworkStore,
{
    async fn deactivate_code(&self, code: &ReferralCode) -> Result<(), Error> {
        self.run_with_retries("deactivate_code", || self.try_deactivate(code))
            .await?;
        info!(code = %code, "referral code deactivated");
        Ok(())
    }
}
