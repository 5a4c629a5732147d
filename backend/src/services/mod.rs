//! Business logic services for the LPG stock ledger

pub mod ledger;

pub use ledger::StockLedgerService;
