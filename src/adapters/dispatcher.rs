use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::adapters::traits::RewardDispatcher;
use crate::error::{AppResult, ReferralError, ReferralResult};
use crate::referral::models::RewardProgram;

#[derive(Debug, Serialize)]
pub struct GrantRequest {
    pub referrer_id: Uuid,
    pub link_id: i64,
    pub award_id: i64,
    pub service_id: i16,
}

/// Key the grant service uses to collapse repeated deliveries
pub fn idempotency_key(link_id: i64) -> String {
    format!("ref-link-{}", link_id)
}

/// Grant service client
pub struct HttpRewardDispatcher {
    client: Client,
    grants_url: String,
    program: RewardProgram,
}

impl HttpRewardDispatcher {
    pub fn new(base_url: &str, program: RewardProgram, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            grants_url: format!("{}/grants", base_url.trim_end_matches('/')),
            program,
        })
    }

    fn request_for(&self, referrer_id: Uuid, link_id: i64) -> GrantRequest {
        GrantRequest {
            referrer_id,
            link_id,
            award_id: self.program.referrer_award_id,
            service_id: self.program.referrer_service.id(),
        }
    }
}

#[async_trait]
impl RewardDispatcher for HttpRewardDispatcher {
    fn name(&self) -> &'static str {
        "http-grant"
    }

    async fn grant(&self, referrer_id: Uuid, link_id: i64) -> ReferralResult<()> {
        let failure = |reason: String| ReferralError::Dispatch {
            referrer_id,
            link_id,
            reason,
        };

        let response = self
            .client
            .post(&self.grants_url)
            .header("Idempotency-Key", idempotency_key(link_id))
            .json(&self.request_for(referrer_id, link_id))
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("grant service returned {}", status)));
        }

        info!(%referrer_id, link_id, award_id = self.program.referrer_award_id, "🎁 Referral award granted");
        Ok(())
    }
}

/// Dispatcher used when no grant service is configured: the reward flag is
/// the only effect, and the grant is recorded in the logs.
pub struct LogOnlyDispatcher {
    program: RewardProgram,
}

impl LogOnlyDispatcher {
    pub fn new(program: RewardProgram) -> Self {
        Self { program }
    }
}

#[async_trait]
impl RewardDispatcher for LogOnlyDispatcher {
    fn name(&self) -> &'static str {
        "log-only"
    }

    async fn grant(&self, referrer_id: Uuid, link_id: i64) -> ReferralResult<()> {
        info!(
            %referrer_id,
            link_id,
            award_id = self.program.referrer_award_id,
            service = ?self.program.referrer_service,
            "Referral award due (no grant service configured)"
        );
        Ok(())
    }
}
