//! Models for the Mill Costing Platform
//!
//! Re-exports the costing and ledger models from the shared crate

pub use shared::costing::{TargetSnapshot, TargetTracker};
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;
