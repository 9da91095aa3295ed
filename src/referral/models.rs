use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Type, prelude::FromRow};
use std::fmt;
use uuid::Uuid;

/// Reward status of a referral link
///
/// Only ever moves Pending → Rewarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "reward_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
    Pending,
    Rewarded,
}

impl RewardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardStatus::Pending => "pending",
            RewardStatus::Rewarded => "rewarded",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RewardStatus::Pending)
    }
}

impl fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Referral link between an inviting user and the user they invited
///
/// INVARIANT: referrer_id != referee_id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReferralLink {
    pub id: i64,
    pub referrer_id: Uuid,
    pub referee_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub reward_status: RewardStatus,
    pub rewarded_at: Option<DateTime<Utc>>,
}

impl ReferralLink {
    pub fn is_pending(&self) -> bool {
        self.reward_status.is_pending()
    }
}

/// Downstream service that grants the referrer's award
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardService {
    Offer = 1,
    Loyalty = 2,
}

impl RewardService {
    pub fn id(&self) -> i16 {
        *self as i16
    }
}

/// Program settings the reward pass depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardProgram {
    /// Minimum referee spend for the referrer to qualify
    pub min_sum: Decimal,
    pub referrer_award_id: i64,
    pub referrer_service: RewardService,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub considered_referees: usize,
    pub eligible_referees: usize,
    pub candidate_referrers: usize,
    /// Links flipped to Rewarded by this pass
    pub rewarded_links: usize,
    pub rewarded_referrers: usize,
    pub dispatch_failures: usize,
}

impl PassReport {
    pub fn is_noop(&self) -> bool {
        self.rewarded_links == 0
    }
}
