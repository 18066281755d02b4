//! Business logic services for the Mill Costing Platform

pub mod autosave;
pub mod costing;

pub use autosave::{Autosaver, DraftStore};
pub use costing::CostingService;
