use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::*;
use crate::error::{ReferralError, ReferralResult};

const LINK_COLUMNS: &str = "id, referrer_id, referee_id, created_at, reward_status, rewarded_at";

/// Durable store of referral links - the only arbiter of reward transitions
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Insert a new Pending link
    async fn create(&self, referrer_id: Uuid, referee_id: Uuid) -> ReferralResult<ReferralLink>;

    async fn get(&self, id: i64) -> ReferralResult<Option<ReferralLink>>;

    /// Referees of every Pending link, read in one statement
    async fn list_unresolved_referees(&self) -> ReferralResult<HashSet<Uuid>>;

    /// Referrers of Pending links whose referee is in `referee_ids`
    async fn list_referrers_for(&self, referee_ids: &HashSet<Uuid>) -> ReferralResult<HashSet<Uuid>>;

    /// Flip the Pending links from `referrer_ids` to `referee_ids` to Rewarded.
    ///
    /// A referrer's links to referees outside `referee_ids` stay Pending.
    /// Returns only the rows this call changed; a racing pass that got there
    /// first leaves nothing for this one.
    async fn mark_rewarded(
        &self,
        referrer_ids: &HashSet<Uuid>,
        referee_ids: &HashSet<Uuid>,
    ) -> ReferralResult<Vec<ReferralLink>>;
}

/// Rejects links that must never reach the store
pub fn check_new_link(referrer_id: Uuid, referee_id: Uuid) -> ReferralResult<()> {
    if referrer_id == referee_id {
        return Err(ReferralError::Conflict(format!(
            "User {} cannot refer themselves",
            referrer_id
        )));
    }
    Ok(())
}

/// Postgres-backed link store
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn create(&self, referrer_id: Uuid, referee_id: Uuid) -> ReferralResult<ReferralLink> {
        check_new_link(referrer_id, referee_id)?;

        let link = sqlx::query_as::<_, ReferralLink>(&format!(
            r#"
            INSERT INTO ref_links (referrer_id, referee_id)
            VALUES ($1, $2)
            RETURNING {}
            "#,
            LINK_COLUMNS
        ))
        .bind(referrer_id)
        .bind(referee_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_check_violation() {
                    return ReferralError::Conflict(format!(
                        "Link {} -> {} violates {}",
                        referrer_id,
                        referee_id,
                        db.constraint().unwrap_or("a table constraint")
                    ));
                }
            }
            ReferralError::Store(e)
        })?;

        info!(link_id = link.id, %referrer_id, %referee_id, "Referral link created");
        Ok(link)
    }

    async fn get(&self, id: i64) -> ReferralResult<Option<ReferralLink>> {
        let link = sqlx::query_as::<_, ReferralLink>(&format!(
            "SELECT {} FROM ref_links WHERE id = $1",
            LINK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn list_unresolved_referees(&self) -> ReferralResult<HashSet<Uuid>> {
        let referees: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT referee_id
            FROM ref_links
            WHERE reward_status = $1
            "#,
        )
        .bind(RewardStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(referees.into_iter().collect())
    }

    async fn list_referrers_for(&self, referee_ids: &HashSet<Uuid>) -> ReferralResult<HashSet<Uuid>> {
        if referee_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let referee_ids: Vec<Uuid> = referee_ids.iter().copied().collect();
        let referrers: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT referrer_id
            FROM ref_links
            WHERE referee_id = ANY($1) AND reward_status = $2
            "#,
        )
        .bind(&referee_ids)
        .bind(RewardStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrers.into_iter().collect())
    }

    async fn mark_rewarded(
        &self,
        referrer_ids: &HashSet<Uuid>,
        referee_ids: &HashSet<Uuid>,
    ) -> ReferralResult<Vec<ReferralLink>> {
        if referrer_ids.is_empty() || referee_ids.is_empty() {
            return Ok(Vec::new());
        }

        let referrer_ids: Vec<Uuid> = referrer_ids.iter().copied().collect();
        let referee_ids: Vec<Uuid> = referee_ids.iter().copied().collect();

        // Guarded by the current status so racing passes cannot both flip a row
        let updated = sqlx::query_as::<_, ReferralLink>(&format!(
            r#"
            UPDATE ref_links
            SET reward_status = $3, rewarded_at = NOW()
            WHERE referrer_id = ANY($1) AND referee_id = ANY($2) AND reward_status = $4
            RETURNING {}
            "#,
            LINK_COLUMNS
        ))
        .bind(&referrer_ids)
        .bind(&referee_ids)
        .bind(RewardStatus::Rewarded)
        .bind(RewardStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            requested = referrer_ids.len(),
            updated = updated.len(),
            "Conditional reward update applied"
        );
        Ok(updated)
    }
}
