//! Domain models for the Mill Costing Platform

mod costing;
mod ledger;

pub(crate) use costing::{non_negative, saturating_sum};
pub use costing::*;
pub use ledger::*;
