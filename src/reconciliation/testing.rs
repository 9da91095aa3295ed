//! Hand-written doubles for the reward pass boundaries.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::traits::{EligibilityOracle, RewardDispatcher};
use crate::error::{ReferralError, ReferralResult};
use crate::referral::models::ReferralLink;
use crate::referral::{InMemoryLinkStore, LinkStore};

/// Oracle with a fixed answer; fails its first `failures` calls
#[derive(Default)]
pub struct StaticOracle {
    pub eligible: HashSet<Uuid>,
    pub failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl StaticOracle {
    pub fn eligible(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            eligible: ids.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn failing(times: usize) -> Self {
        Self {
            failures: AtomicUsize::new(times),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EligibilityOracle for StaticOracle {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn filter_eligible(&self, referee_ids: &HashSet<Uuid>) -> ReferralResult<HashSet<Uuid>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ReferralError::OracleUnavailable("spend service down".into()));
        }
        Ok(referee_ids.intersection(&self.eligible).copied().collect())
    }
}

/// Oracle that lets another process reward `referrer` while it answers
pub struct RacingOracle {
    pub store: Arc<InMemoryLinkStore>,
    pub referrer: Uuid,
}

#[async_trait]
impl EligibilityOracle for RacingOracle {
    fn name(&self) -> &'static str {
        "racing"
    }

    async fn filter_eligible(&self, referee_ids: &HashSet<Uuid>) -> ReferralResult<HashSet<Uuid>> {
        self.store
            .mark_rewarded(&HashSet::from([self.referrer]), referee_ids)
            .await?;
        Ok(referee_ids.clone())
    }
}

/// Dispatcher recording every grant; fails for the listed referrers
#[derive(Default)]
pub struct RecordingDispatcher {
    pub granted: Mutex<Vec<(Uuid, i64)>>,
    pub fail_for: HashSet<Uuid>,
}

impl RecordingDispatcher {
    pub fn failing_for(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            fail_for: ids.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn referrers(&self) -> HashSet<Uuid> {
        self.granted.lock().iter().map(|(referrer, _)| *referrer).collect()
    }

    pub fn count(&self) -> usize {
        self.granted.lock().len()
    }
}

#[async_trait]
impl RewardDispatcher for RecordingDispatcher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn grant(&self, referrer_id: Uuid, link_id: i64) -> ReferralResult<()> {
        if self.fail_for.contains(&referrer_id) {
            return Err(ReferralError::Dispatch {
                referrer_id,
                link_id,
                reason: "grant service rejected".into(),
            });
        }
        self.granted.lock().push((referrer_id, link_id));
        Ok(())
    }
}

/// Store wrapper counting writes, optionally failing the reward commit
pub struct ProbeStore {
    pub inner: Arc<InMemoryLinkStore>,
    pub fail_commit: bool,
    pub writes: AtomicUsize,
}

impl ProbeStore {
    pub fn new(inner: Arc<InMemoryLinkStore>) -> Self {
        Self {
            inner,
            fail_commit: false,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn failing_commit(inner: Arc<InMemoryLinkStore>) -> Self {
        Self {
            fail_commit: true,
            ..Self::new(inner)
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkStore for ProbeStore {
    async fn create(&self, referrer_id: Uuid, referee_id: Uuid) -> ReferralResult<ReferralLink> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create(referrer_id, referee_id).await
    }

    async fn get(&self, id: i64) -> ReferralResult<Option<ReferralLink>> {
        self.inner.get(id).await
    }

    async fn list_unresolved_referees(&self) -> ReferralResult<HashSet<Uuid>> {
        self.inner.list_unresolved_referees().await
    }

    async fn list_referrers_for(&self, referee_ids: &HashSet<Uuid>) -> ReferralResult<HashSet<Uuid>> {
        self.inner.list_referrers_for(referee_ids).await
    }

    async fn mark_rewarded(
        &self,
        referrer_ids: &HashSet<Uuid>,
        referee_ids: &HashSet<Uuid>,
    ) -> ReferralResult<Vec<ReferralLink>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            return Err(ReferralError::Store(sqlx::Error::PoolTimedOut));
        }
        self.inner.mark_rewarded(referrer_ids, referee_ids).await
    }
}
