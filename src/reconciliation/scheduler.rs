// Reward Scheduler - runs reconciliation passes on a fixed cadence
//
// - Each tick runs one pass from scratch against the store
// - Read-phase store failures and oracle outages are retried with backoff
// - A failed reward commit ends the tick; the next tick re-derives state

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::error::ReferralResult;
use crate::reconciliation::RewardReconciler;
use crate::referral::models::PassReport;

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Reward schedule configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between pass starts
    pub interval: Duration,
    /// Extra attempts for a retryable failure within one tick
    pub max_retries: u32,
    /// First backoff delay, doubled on each further attempt
    pub retry_backoff: Duration,
}

pub struct RewardScheduler {
    config: SchedulerConfig,
    reconciler: Arc<RewardReconciler>,
}

impl RewardScheduler {
    pub fn new(config: SchedulerConfig, reconciler: Arc<RewardReconciler>) -> Self {
        Self { config, reconciler }
    }

    /// Start the scheduler loop in the background
    pub fn start(&self) -> JoinHandle<()> {
        let config = self.config.clone();
        let reconciler = self.reconciler.clone();

        tokio::spawn(async move {
            let mut ticker = interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                info!("🔄 Starting referral reward pass");
                if let Err(e) = Self::run_with_retry(&config, &reconciler).await {
                    error!("❌ Referral reward pass failed: {}", e);
                }
            }
        })
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Single tick, used by run-once mode
    pub async fn run_once(&self) -> ReferralResult<PassReport> {
        Self::run_with_retry(&self.config, &self.reconciler).await
    }

    async fn run_with_retry(
        config: &SchedulerConfig,
        reconciler: &RewardReconciler,
    ) -> ReferralResult<PassReport> {
        let mut attempt = 0;

        loop {
            match reconciler.run_pass().await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    let delay = Self::backoff_delay(config.retry_backoff, attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "⚠️ Retrying reward pass: {}",
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Exponential backoff: base * 2^attempt, capped
    fn backoff_delay(base: Duration, attempt: u32) -> Duration {
        base.checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReferralError;
    use crate::reconciliation::testing::*;
    use crate::referral::{InMemoryLinkStore, LinkStore};
    use uuid::Uuid;

    fn config(max_retries: u32) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(3600),
            max_retries,
            retry_backoff: Duration::from_millis(1),
        }
    }

    async fn store_with_one_link() -> (Arc<InMemoryLinkStore>, Uuid) {
        let store = Arc::new(InMemoryLinkStore::new());
        let referee = Uuid::new_v4();
        store.create(Uuid::new_v4(), referee).await.unwrap();
        (store, referee)
    }

    #[test]
    fn test_backoff_delay() {
        let base = Duration::from_millis(500);
        assert_eq!(RewardScheduler::backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(RewardScheduler::backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(RewardScheduler::backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(RewardScheduler::backoff_delay(base, 40), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_started_scheduler_runs_a_pass_until_aborted() {
        let (store, referee) = store_with_one_link().await;
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let reconciler = Arc::new(RewardReconciler::new(
            store.clone(),
            Arc::new(StaticOracle::eligible([referee])),
            dispatcher.clone(),
        ));

        // First interval tick fires immediately
        let handle = RewardScheduler::new(config(0), reconciler).start();
        for _ in 0..200 {
            if dispatcher.count() > 0 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        handle.abort();

        assert_eq!(dispatcher.count(), 1);
        assert_eq!(store.pending_count(), 0);
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_oracle_outage_is_retried() {
        let (store, referee) = store_with_one_link().await;
        let oracle = Arc::new(StaticOracle {
            failures: 2.into(),
            ..StaticOracle::eligible([referee])
        });
        let reconciler = Arc::new(RewardReconciler::new(
            store.clone(),
            oracle.clone(),
            Arc::new(RecordingDispatcher::default()),
        ));

        let report = RewardScheduler::new(config(3), reconciler).run_once().await.unwrap();

        assert_eq!(report.rewarded_links, 1);
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (store, _) = store_with_one_link().await;
        let oracle = Arc::new(StaticOracle::failing(10));
        let reconciler = Arc::new(RewardReconciler::new(
            store.clone(),
            oracle.clone(),
            Arc::new(RecordingDispatcher::default()),
        ));

        let result = RewardScheduler::new(config(2), reconciler).run_once().await;

        assert!(matches!(result, Err(ReferralError::OracleUnavailable(_))));
        assert_eq!(oracle.calls(), 3);
        assert_eq!(store.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_is_not_retried() {
        let (store, referee) = store_with_one_link().await;
        let probe = Arc::new(ProbeStore::failing_commit(store.clone()));
        let oracle = Arc::new(StaticOracle::eligible([referee]));
        let reconciler = Arc::new(RewardReconciler::new(
            probe.clone(),
            oracle.clone(),
            Arc::new(RecordingDispatcher::default()),
        ));

        let result = RewardScheduler::new(config(5), reconciler).run_once().await;

        assert!(matches!(result, Err(ReferralError::Commit(_))));
        assert_eq!(oracle.calls(), 1);
        assert_eq!(probe.writes(), 1);
    }
}
