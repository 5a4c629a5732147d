//! Movement persistence boundary
//!
//! The ledger never trusts a stored balance. Stores only keep movements and
//! every figure is re-derived from them.

mod memory;

pub use memory::InMemoryMovementStore;

use std::future::Future;

use serde::{Deserialize, Serialize};
use shared::{DateWindow, LineageKey, Movement};
use uuid::Uuid;

use crate::error::AppResult;

/// Which movements to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub lineage: Option<LineageKey>,
    pub window: DateWindow,
}

impl MovementFilter {
    /// Every movement in the store
    pub fn all() -> Self {
        Self::default()
    }

    pub fn lineage(lineage: LineageKey) -> Self {
        Self {
            lineage: Some(lineage),
            window: DateWindow::all(),
        }
    }

    pub fn window(window: DateWindow) -> Self {
        Self {
            lineage: None,
            window,
        }
    }

    pub fn matches(&self, movement: &Movement) -> bool {
        self.lineage.map_or(true, |l| l == movement.lineage) && self.window.contains(movement.date)
    }
}

/// Append/list/delete store of immutable movements.
///
/// Implementations:
/// - `InMemoryMovementStore`: process-local storage, used by the CLI and tests
pub trait MovementStore: Send + Sync {
    /// Persist one movement and return its id
    fn append(&self, movement: Movement) -> impl Future<Output = AppResult<Uuid>> + Send;

    /// Persist several movements atomically: either all are written or none
    fn append_all(&self, movements: Vec<Movement>) -> impl Future<Output = AppResult<Vec<Uuid>>> + Send;

    /// Movements matching `filter`. Order is unspecified.
    fn list(&self, filter: MovementFilter) -> impl Future<Output = AppResult<Vec<Movement>>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = AppResult<Option<Movement>>> + Send;

    /// Hard-delete movements atomically. Fails with `NotFound` when any id is
    /// missing, in which case nothing is deleted.
    fn delete_all(&self, ids: Vec<Uuid>) -> impl Future<Output = AppResult<()>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = AppResult<()>> + Send {
        self.delete_all(vec![id])
    }
}
