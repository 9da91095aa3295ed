use std::{future::Future, sync::Arc, time::Duration};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{error, info, warn};
use crate::{
    adapters::{EligibilityOracle, HttpEligibilityOracle, HttpRewardDispatcher, LogOnlyDispatcher, RewardDispatcher},
    config::Config,
    error::AppResult,
    reconciliation::{RewardReconciler, RewardScheduler, SchedulerConfig},
    referral::{LinkStore, PassReport, PgLinkStore},
};

/// Everything the worker owns; dropped or closed explicitly on shutdown
pub struct Worker {
    pub pool: PgPool,
    pub scheduler: RewardScheduler,
}

impl Worker {
    /// One pass with retries, then release the pool
    pub async fn run_once(self) -> AppResult<PassReport> {
        let outcome = self.scheduler.run_once().await;
        self.pool.close().await;
        Ok(outcome?)
    }

    /// Scheduled passes until `shutdown` resolves.
    ///
    /// The scheduler task is stopped before the pool closes, so no tick
    /// observes a closed pool.
    pub async fn run_until<F>(self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut handle = self.scheduler.start();
        info!(
            "⏰ Reward passes scheduled every {}s",
            self.scheduler.interval().as_secs()
        );

        tokio::select! {
            result = &mut handle => {
                if let Err(e) = result {
                    error!("Scheduler task stopped: {}", e);
                }
            }
            _ = shutdown => {
                info!("🛑 Shutdown requested");
                handle.abort();
                let _ = handle.await;
            }
        }

        self.pool.close().await;
        Ok(())
    }
}

pub async fn initialize_worker(config: &Config) -> AppResult<Worker> {
    info!("Initializing referral reward worker ...");

    let pool = initialize_database(&config.database_url, config.max_connections).await?;
    let store: Arc<dyn LinkStore> = Arc::new(PgLinkStore::new(pool.clone()));

    let http_timeout = Duration::from_secs(config.http_timeout_secs);
    let program = config.reward_program();

    let oracle: Arc<dyn EligibilityOracle> = Arc::new(HttpEligibilityOracle::new(
        config.eligibility_url.clone(),
        program.min_sum,
        http_timeout,
    )?);
    info!("✅ Eligibility oracle: {} (min sum {})", config.eligibility_url, program.min_sum);

    let dispatcher: Arc<dyn RewardDispatcher> = match &config.dispatcher_url {
        Some(url) => {
            info!("✅ Reward dispatcher: {}", url);
            Arc::new(HttpRewardDispatcher::new(url, program, http_timeout)?)
        }
        None => {
            warn!("⚠️  DISPATCHER_URL not set - rewards will be flagged and logged only");
            Arc::new(LogOnlyDispatcher::new(program))
        }
    };

    let reconciler = Arc::new(
        RewardReconciler::new(store, oracle, dispatcher)
            .with_dispatch_concurrency(config.dispatch_concurrency),
    );

    let scheduler = RewardScheduler::new(
        SchedulerConfig {
            interval: Duration::from_secs(config.reconcile_interval_secs),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        },
        reconciler,
    );

    Ok(Worker { pool, scheduler })
}

async fn initialize_database(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    info!("✓ Database pool configured: {} max connections", max_connections);

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
