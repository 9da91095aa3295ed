// Referral reward reconciliation
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapters::traits::{EligibilityOracle, RewardDispatcher};
use crate::error::{ReferralError, ReferralResult};
use crate::referral::models::{PassReport, ReferralLink};
use crate::referral::repository::LinkStore;

pub use scheduler::{RewardScheduler, SchedulerConfig};

const DEFAULT_DISPATCH_CONCURRENCY: usize = 8;

/// Runs reconciliation passes against the link store.
///
/// Holds no mutable state of its own; concurrent passes are arbitrated by
/// the store's conditional reward update.
pub struct RewardReconciler {
    store: Arc<dyn LinkStore>,
    oracle: Arc<dyn EligibilityOracle>,
    dispatcher: Arc<dyn RewardDispatcher>,
    dispatch_concurrency: usize,
}

impl RewardReconciler {
    pub fn new(
        store: Arc<dyn LinkStore>,
        oracle: Arc<dyn EligibilityOracle>,
        dispatcher: Arc<dyn RewardDispatcher>,
    ) -> Self {
        Self {
            store,
            oracle,
            dispatcher,
            dispatch_concurrency: DEFAULT_DISPATCH_CONCURRENCY,
        }
    }

    pub fn with_dispatch_concurrency(mut self, concurrency: usize) -> Self {
        self.dispatch_concurrency = concurrency.max(1);
        self
    }

    /// One pass: read unresolved → filter eligible → read referrers →
    /// commit reward → dispatch.
    ///
    /// Nothing is written before the commit, so any failure up to that
    /// point leaves the store untouched. Dispatch happens only after the
    /// commit and its failures never undo it.
    pub async fn run_pass(&self) -> ReferralResult<PassReport> {
        let mut report = PassReport::default();

        // 1. Unresolved referees
        let pending = self.store.list_unresolved_referees().await?;
        report.considered_referees = pending.len();

        if pending.is_empty() {
            info!("✓ No pending referral links");
            return Ok(report);
        }

        // 2. Whole batch to the oracle
        let eligible: HashSet<Uuid> = self
            .oracle
            .filter_eligible(&pending)
            .await
            .map_err(|e| match e {
                e @ ReferralError::OracleUnavailable(_) => e,
                other => ReferralError::OracleUnavailable(other.to_string()),
            })?
            .into_iter()
            .filter(|id| pending.contains(id))
            .collect();
        report.eligible_referees = eligible.len();

        if eligible.is_empty() {
            info!(considered = report.considered_referees, "✓ No referee reached the threshold");
            return Ok(report);
        }

        // 3. Referrers still attached to pending links
        let candidates = self.store.list_referrers_for(&eligible).await?;
        report.candidate_referrers = candidates.len();

        if candidates.is_empty() {
            debug!("Eligible links were resolved by another pass");
            return Ok(report);
        }

        // 4. Commit, limited to links whose referee qualified. Not retried
        // in-pass: the next pass re-derives state.
        let rewarded = self
            .store
            .mark_rewarded(&candidates, &eligible)
            .await
            .map_err(|e| ReferralError::Commit(Box::new(e)))?;

        report.rewarded_links = rewarded.len();
        report.rewarded_referrers = rewarded
            .iter()
            .map(|link| link.referrer_id)
            .collect::<HashSet<_>>()
            .len();

        if rewarded.is_empty() {
            debug!(
                candidates = candidates.len(),
                "Qualifying links were already rewarded by a concurrent pass"
            );
            return Ok(report);
        }

        // 5. Grants, strictly after the commit
        report.dispatch_failures = self.dispatch(&rewarded).await;

        info!(
            considered = report.considered_referees,
            eligible = report.eligible_referees,
            rewarded_links = report.rewarded_links,
            rewarded_referrers = report.rewarded_referrers,
            dispatch_failures = report.dispatch_failures,
            "✓ Reward pass completed"
        );

        Ok(report)
    }

    /// Grants one award per rewarded link; returns the number of failures.
    async fn dispatch(&self, rewarded: &[ReferralLink]) -> usize {
        let grants: Vec<(Uuid, i64)> = rewarded
            .iter()
            .map(|link| (link.referrer_id, link.id))
            .collect();
        let dispatcher = self.dispatcher.clone();

        // Grant futures own their inputs; the pass must stay Send for the scheduler
        let outcomes: Vec<ReferralResult<()>> = stream::iter(grants)
            .map(move |(referrer_id, link_id)| {
                let dispatcher = dispatcher.clone();
                async move { dispatcher.grant(referrer_id, link_id).await }
            })
            .buffer_unordered(self.dispatch_concurrency)
            .collect()
            .await;

        let mut failures = 0;
        for outcome in outcomes {
            if let Err(e) = outcome {
                failures += 1;
                // Flag stays set; grant/flag mismatches are picked up out of band
                error!(dispatcher = self.dispatcher.name(), "❌ {}", e);
            }
        }

        if failures > 0 {
            warn!(failures, total = rewarded.len(), "Reward dispatch incomplete");
        }
        failures
    }
}
