//! Shared stock ledger engine for the LPG distribution platform
//!
//! This crate holds the pure computations shared by the backend service and
//! the browser bindings: movement validation, running balance reconstruction,
//! inventory reconciliation, the transfer availability gate, discrepancy
//! detection and stock summaries. Nothing here performs I/O.

pub mod aggregation;
pub mod availability;
pub mod discrepancy;
pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use aggregation::*;
pub use availability::*;
pub use discrepancy::*;
pub use ledger::*;
pub use models::*;
pub use types::*;
pub use validation::*;
