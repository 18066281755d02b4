//! HTTP request handlers

pub mod costing;
pub mod health;
pub mod ledger;

pub use costing::*;
pub use health::*;
pub use ledger::*;
