//! Shared types and models for the Mill Costing Platform
//!
//! This crate contains the costing engine, ledger formulas and types shared
//! between the backend, the frontend (via WASM), and other components of the
//! system.

pub mod costing;
pub mod models;
pub mod types;
pub mod validation;

pub use costing::*;
pub use models::*;
pub use types::*;
pub use validation::*;
