use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::referral::models::{RewardProgram, RewardService};

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct Config {
    pub database_url: String,
    #[validate(range(min = 1))]
    pub max_connections: u32,

    /// Batch eligibility endpoint
    #[validate(url)]
    pub eligibility_url: String,
    /// Grant endpoint base; grants are only logged when unset
    #[validate(url)]
    pub dispatcher_url: Option<String>,
    #[validate(range(min = 1))]
    pub http_timeout_secs: u64,

    pub min_sum: Decimal,
    pub referrer_award_id: i64,
    pub referrer_service: RewardService,

    #[validate(range(min = 1))]
    pub reconcile_interval_secs: u64,
    #[validate(range(min = 1))]
    pub dispatch_concurrency: usize,
    pub max_retries: u32,
    #[validate(range(min = 1))]
    pub retry_backoff_ms: u64,
    pub run_once: bool,
}

impl Config {
    /// Defaults overlaid by environment variables (`DATABASE_URL`, `MIN_SUM`, ...)
    pub fn from_env() -> AppResult<Self> {
        let settings = config::Config::builder()
            .set_default("database_url", "postgresql://localhost/referrals")?
            .set_default("max_connections", 2)?
            .set_default("eligibility_url", "http://localhost:8081/eligibility")?
            .set_default("http_timeout_secs", 10)?
            .set_default("min_sum", "500")?
            .set_default("referrer_award_id", 1)?
            .set_default("referrer_service", "offer")?
            .set_default("reconcile_interval_secs", 3600)?
            .set_default("dispatch_concurrency", 8)?
            .set_default("max_retries", 3)?
            .set_default("retry_backoff_ms", 500)?
            .set_default("run_once", false)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn reward_program(&self) -> RewardProgram {
        RewardProgram {
            min_sum: self.min_sum,
            referrer_award_id: self.referrer_award_id,
            referrer_service: self.referrer_service,
        }
    }
}
