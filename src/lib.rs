//! Referral reward reconciliation: finds referrers whose referees crossed
//! the spend threshold, flips their links to rewarded exactly once, and
//! hands the awards to the grant service.

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod reconciliation;
pub mod referral;
