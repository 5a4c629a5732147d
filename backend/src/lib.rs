//! LPG stock ledger service
//!
//! Wraps the pure ledger engine of the `shared` crate with a movement store,
//! per-lineage write serialization, cached balances and configuration.

pub mod config;
pub mod error;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::StockLedgerService;
pub use store::{InMemoryMovementStore, MovementFilter, MovementStore};
