use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapters::traits::EligibilityOracle;
use crate::error::{AppResult, ReferralError, ReferralResult};

/// Batch request sent to the spend-check service
#[derive(Debug, Serialize)]
pub struct EligibilityRequest<'a> {
    pub referee_ids: Vec<&'a Uuid>,
    pub min_sum: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct EligibilityResponse {
    pub eligible: Vec<Uuid>,
}

/// Spend-check service client
pub struct HttpEligibilityOracle {
    client: Client,
    url: String,
    min_sum: Decimal,
}

impl HttpEligibilityOracle {
    pub fn new(url: String, min_sum: Decimal, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, min_sum })
    }
}

#[async_trait]
impl EligibilityOracle for HttpEligibilityOracle {
    fn name(&self) -> &'static str {
        "http-spend-check"
    }

    async fn filter_eligible(&self, referee_ids: &HashSet<Uuid>) -> ReferralResult<HashSet<Uuid>> {
        if referee_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let request = EligibilityRequest {
            referee_ids: referee_ids.iter().collect(),
            min_sum: self.min_sum,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReferralError::OracleUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, url = %self.url, "Eligibility service rejected batch");
            return Err(ReferralError::OracleUnavailable(format!(
                "eligibility service returned {}",
                status
            )));
        }

        let body: EligibilityResponse = response
            .json()
            .await
            .map_err(|e| ReferralError::OracleUnavailable(format!("malformed response: {}", e)))?;

        debug!(
            requested = referee_ids.len(),
            eligible = body.eligible.len(),
            "Eligibility batch answered"
        );
        Ok(body.eligible.into_iter().collect())
    }
}
