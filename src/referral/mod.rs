pub mod memory;
pub mod models;
pub mod repository;

pub use memory::InMemoryLinkStore;
pub use models::{PassReport, ReferralLink, RewardProgram, RewardService, RewardStatus};
pub use repository::{LinkStore, PgLinkStore};
