pub mod dispatcher;
pub mod eligibility;
pub mod traits;

pub use dispatcher::{HttpRewardDispatcher, LogOnlyDispatcher};
pub use eligibility::HttpEligibilityOracle;
pub use traits::{EligibilityOracle, RewardDispatcher};
