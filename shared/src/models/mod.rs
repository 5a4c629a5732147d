//! Domain models for the LPG stock ledger

mod movement;
mod stock;

pub use movement::*;
pub use stock::*;
