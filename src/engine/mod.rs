//! Round allocation engine.
//!
//! - [`resolver`]: fallback chain and cross-team swap for one slot
//! - [`selector`]: quota-constrained selection for scarce categories
//! - [`tiers`]: which tier the next round is
//! - [`orchestrator`]: one full round, start to grant

pub mod orchestrator;
pub mod resolver;
pub mod selector;
pub mod tiers;

pub use orchestrator::{
    AllocatorState, ItemGranter, PermissionCategory, PermissionOracle, RoundAllocationResult,
    RoundAllocator, RoundPlayer, RoundReport,
};
pub use resolver::{PreferenceResolver, Resolution};
pub use selector::{select_players, QuotaSettings};
pub use tiers::RoundTierPlanner;
