//! PostgreSQL-backed network store using sqlx.
//!
//! Sessions run as SERIALIZABLE transactions. PostgreSQL aborts one side of
//! any dangerous interleaving with SQLSTATE 40001 (or 40P01 for deadlocks);
//! both are mapped to [`StoreError::Conflict`] so the domain retry loop
//! treats them exactly like the in-memory adapter's version conflicts.
//! Schema migrations are embedded from `migrations/` at compile time.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::ports::{CodeRecord, DirectReferral, NetworkSession, NetworkStore, StoreError};
use crate::domain::{
    DisplayName, PhoneNumber, Rank, ReferralCode, ReferralEvent, UserId, UserProfile,
};

const SELECT_PROFILE: &str = "SELECT id, phone, display_name, referral_code, referred_by, \
     upline, direct_referrals, team_size, rank, created_at \
     FROM profiles WHERE id = $1";

const UPSERT_PROFILE: &str = "INSERT INTO profiles (id, phone, display_name, referral_code, referred_by, \
     upline, direct_referrals, team_size, rank, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
     ON CONFLICT (id) DO UPDATE SET \
         phone = EXCLUDED.phone, \
         display_name = EXCLUDED.display_name, \
         referral_code = EXCLUDED.referral_code, \
         referred_by = EXCLUDED.referred_by, \
         upline = EXCLUDED.upline, \
         direct_referrals = EXCLUDED.direct_referrals, \
         team_size = EXCLUDED.team_size, \
         rank = EXCLUDED.rank";

const SELECT_CODE: &str =
    "SELECT code, owner, active, created_at FROM referral_codes WHERE code = $1";

const UPSERT_CODE: &str = "INSERT INTO referral_codes (code, owner, active, created_at) \
     VALUES ($1, $2, $3, $4) \
     ON CONFLICT (code) DO UPDATE SET active = EXCLUDED.active";

const INSERT_EVENT: &str = "INSERT INTO referral_events (id, referrer, new_user, code, occurred_at) \
     VALUES ($1, $2, $3, $4, $5)";

/// Map a sqlx failure onto the port error taxonomy.
fn map_sqlx(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        // 40001 serialization_failure, 40P01 deadlock_detected, and 23505
        // unique_violation (two transactions claiming one code) all mean
        // "lost the race, re-run the transaction".
        if matches!(db.code().as_deref(), Some("40001" | "40P01" | "23505")) {
            return StoreError::conflict(error);
        }
    }
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::connection(error)
        }
        other => StoreError::query(other),
    }
}

fn decode_counter(row: &PgRow, column: &str) -> Result<u32, StoreError> {
    let raw: i64 = row.try_get(column).map_err(map_sqlx)?;
    u32::try_from(raw)
        .map_err(|_| StoreError::corrupt(format!("column {column} holds invalid counter {raw}")))
}

fn decode_profile(row: &PgRow) -> Result<UserProfile, StoreError> {
    let id: Uuid = row.try_get("id").map_err(map_sqlx)?;
    let phone: String = row.try_get("phone").map_err(map_sqlx)?;
    let display_name: String = row.try_get("display_name").map_err(map_sqlx)?;
    let referral_code: Option<String> = row.try_get("referral_code").map_err(map_sqlx)?;
    let referred_by: Option<Uuid> = row.try_get("referred_by").map_err(map_sqlx)?;
    let upline: Vec<Uuid> = row.try_get("upline").map_err(map_sqlx)?;
    let rank: String = row.try_get("rank").map_err(map_sqlx)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map_sqlx)?;

    Ok(UserProfile {
        id: UserId::from_uuid(id),
        phone: PhoneNumber::new(&phone)
            .map_err(|err| StoreError::corrupt(format!("profile {id} phone: {err}")))?,
        display_name: DisplayName::new(display_name)
            .map_err(|err| StoreError::corrupt(format!("profile {id} display name: {err}")))?,
        referral_code: referral_code
            .map(|raw| {
                ReferralCode::parse(raw)
                    .map_err(|err| StoreError::corrupt(format!("profile {id} code: {err}")))
            })
            .transpose()?,
        referred_by: referred_by.map(UserId::from_uuid),
        upline: upline.into_iter().map(UserId::from_uuid).collect(),
        direct_referrals: decode_counter(row, "direct_referrals")?,
        team_size: decode_counter(row, "team_size")?,
        rank: Rank::from_str(&rank)
            .map_err(|err| StoreError::corrupt(format!("profile {id}: {err}")))?,
        created_at,
    })
}

fn decode_code_record(row: &PgRow) -> Result<CodeRecord, StoreError> {
    let code: String = row.try_get("code").map_err(map_sqlx)?;
    let owner: Uuid = row.try_get("owner").map_err(map_sqlx)?;
    let active: bool = row.try_get("active").map_err(map_sqlx)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map_sqlx)?;
    Ok(CodeRecord {
        code: ReferralCode::parse(&code)
            .map_err(|err| StoreError::corrupt(format!("code record {code}: {err}")))?,
        owner: UserId::from_uuid(owner),
        active,
        created_at,
    })
}

/// PostgreSQL-backed [`NetworkStore`].
#[derive(Clone)]
pub struct PostgresNetworkStore {
    pool: PgPool,
}

impl PostgresNetworkStore {
    /// Connect a fresh pool to the given database URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .map_err(map_sqlx)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::query)
    }
}

#[async_trait]
impl NetworkStore for PostgresNetworkStore {
    async fn begin(&self) -> Result<Box<dyn NetworkSession>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        Ok(Box::new(PostgresSession { tx }))
    }

    async fn profile(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(SELECT_PROFILE)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(decode_profile).transpose()
    }

    async fn direct_referrals(
        &self,
        id: &UserId,
        limit: u32,
    ) -> Result<Vec<DirectReferral>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, display_name, created_at FROM profiles \
             WHERE referred_by = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| {
                let referred: Uuid = row.try_get("id").map_err(map_sqlx)?;
                let display_name: String = row.try_get("display_name").map_err(map_sqlx)?;
                let joined_at: DateTime<Utc> = row.try_get("created_at").map_err(map_sqlx)?;
                Ok(DirectReferral {
                    id: UserId::from_uuid(referred),
                    display_name: DisplayName::new(display_name).map_err(|err| {
                        StoreError::corrupt(format!("profile {referred} display name: {err}"))
                    })?,
                    joined_at,
                })
            })
            .collect()
    }

    async fn events_for(
        &self,
        referrer: &UserId,
        limit: u32,
    ) -> Result<Vec<ReferralEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, referrer, new_user, code, occurred_at FROM referral_events \
             WHERE referrer = $1 ORDER BY occurred_at DESC LIMIT $2",
        )
        .bind(referrer.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id").map_err(map_sqlx)?;
                let event_referrer: Uuid = row.try_get("referrer").map_err(map_sqlx)?;
                let new_user: Uuid = row.try_get("new_user").map_err(map_sqlx)?;
                let code: String = row.try_get("code").map_err(map_sqlx)?;
                let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(map_sqlx)?;
                Ok(ReferralEvent {
                    id,
                    referrer: UserId::from_uuid(event_referrer),
                    new_user: UserId::from_uuid(new_user),
                    code: ReferralCode::parse(&code)
                        .map_err(|err| StoreError::corrupt(format!("event {id} code: {err}")))?,
                    occurred_at,
                })
            })
            .collect()
    }
}

/// SERIALIZABLE transaction over [`PostgresNetworkStore`].
struct PostgresSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl NetworkSession for PostgresSession {
    async fn profile(&mut self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(SELECT_PROFILE)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(decode_profile).transpose()
    }

    async fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        let upline: Vec<Uuid> = profile.upline.iter().map(|id| *id.as_uuid()).collect();
        sqlx::query(UPSERT_PROFILE)
            .bind(profile.id.as_uuid())
            .bind(profile.phone.as_ref())
            .bind(profile.display_name.as_ref())
            .bind(profile.referral_code.as_ref().map(ReferralCode::as_str))
            .bind(profile.referred_by.as_ref().map(|id| *id.as_uuid()))
            .bind(&upline)
            .bind(i64::from(profile.direct_referrals))
            .bind(i64::from(profile.team_size))
            .bind(profile.rank.as_str())
            .bind(profile.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn code_record(
        &mut self,
        code: &ReferralCode,
    ) -> Result<Option<CodeRecord>, StoreError> {
        let row = sqlx::query(SELECT_CODE)
            .bind(code.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(decode_code_record).transpose()
    }

    async fn put_code_record(&mut self, record: &CodeRecord) -> Result<(), StoreError> {
        sqlx::query(UPSERT_CODE)
            .bind(record.code.as_str())
            .bind(record.owner.as_uuid())
            .bind(record.active)
            .bind(record.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn put_event(&mut self, event: &ReferralEvent) -> Result<(), StoreError> {
        sqlx::query(INSERT_EVENT)
            .bind(event.id)
            .bind(event.referrer.as_uuid())
            .bind(event.new_user.as_uuid())
            .bind(event.code.as_str())
            .bind(event.occurred_at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}
