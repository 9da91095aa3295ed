use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::ReferralResult;

/// Answers which referees met the program's spend threshold
#[async_trait]
pub trait EligibilityOracle: Send + Sync {
    fn name(&self) -> &'static str;

    /// Subset of `referee_ids` that qualifies.
    ///
    /// An empty input yields an empty set. Failure is always an error,
    /// never an empty success.
    async fn filter_eligible(&self, referee_ids: &HashSet<Uuid>) -> ReferralResult<HashSet<Uuid>>;
}

/// Grants the award to a referrer whose link was just marked rewarded
#[async_trait]
pub trait RewardDispatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Must tolerate repeated calls for the same link.
    async fn grant(&self, referrer_id: Uuid, link_id: i64) -> ReferralResult<()>;
}
