use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use super::models::*;
use super::repository::{check_new_link, LinkStore};
use crate::error::ReferralResult;

/// In-process link store with the same atomicity as the Postgres one.
///
/// Every operation runs under a single lock acquisition, and the lock is
/// never held across an await point.
#[derive(Default)]
pub struct InMemoryLinkStore {
    inner: RwLock<Links>,
}

#[derive(Default)]
struct Links {
    next_id: i64,
    rows: BTreeMap<i64, ReferralLink>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ReferralLink> {
        self.inner.read().rows.values().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.read().rows.values().filter(|l| l.is_pending()).count()
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn create(&self, referrer_id: Uuid, referee_id: Uuid) -> ReferralResult<ReferralLink> {
        check_new_link(referrer_id, referee_id)?;

        let mut links = self.inner.write();
        links.next_id += 1;
        let link = ReferralLink {
            id: links.next_id,
            referrer_id,
            referee_id,
            created_at: Utc::now(),
            reward_status: RewardStatus::Pending,
            rewarded_at: None,
        };
        links.rows.insert(link.id, link.clone());

        Ok(link)
    }

    async fn get(&self, id: i64) -> ReferralResult<Option<ReferralLink>> {
        Ok(self.inner.read().rows.get(&id).cloned())
    }

    async fn list_unresolved_referees(&self) -> ReferralResult<HashSet<Uuid>> {
        let links = self.inner.read();
        Ok(links
            .rows
            .values()
            .filter(|l| l.is_pending())
            .map(|l| l.referee_id)
            .collect())
    }

    async fn list_referrers_for(&self, referee_ids: &HashSet<Uuid>) -> ReferralResult<HashSet<Uuid>> {
        let links = self.inner.read();
        Ok(links
            .rows
            .values()
            .filter(|l| l.is_pending() && referee_ids.contains(&l.referee_id))
            .map(|l| l.referrer_id)
            .collect())
    }

    async fn mark_rewarded(
        &self,
        referrer_ids: &HashSet<Uuid>,
        referee_ids: &HashSet<Uuid>,
    ) -> ReferralResult<Vec<ReferralLink>> {
        if referrer_ids.is_empty() || referee_ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut links = self.inner.write();
        let updated = links
            .rows
            .values_mut()
            .filter(|l| {
                l.is_pending()
                    && referrer_ids.contains(&l.referrer_id)
                    && referee_ids.contains(&l.referee_id)
            })
            .map(|l| {
                l.reward_status = RewardStatus::Rewarded;
                l.rewarded_at = Some(now);
                l.clone()
            })
            .collect();

        Ok(updated)
    }
}
