//! Running balance reconstruction
//!
//! Every stock figure in the system comes out of [`reconstruct_lineage`]: the
//! movements of one lineage are sorted by `(date, created_at, id)` and folded
//! from zero. Incoming adds, outgoing subtracts, and an inventory rebases the
//! balance to the counted stock while recording the écart against the
//! theoretical figure it replaces.
//!
//! Stock is never clamped. A lineage that goes below zero without a count to
//! explain it keeps its negative figure so callers can flag it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::availability::{check_availability, AvailabilityCheck};
use crate::models::{LineageKey, Movement, MovementKind, SortKey, StockLevel, StockState};

/// A movement annotated with the running balance around it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub movement: Movement,
    pub stock_before: i64,
    pub stock_after: i64,
    /// `counted_stock - stock_before`, inventories only. Positive is a
    /// physical surplus, negative a shortage.
    pub ecart: Option<i64>,
}

impl LedgerEntry {
    fn apply(movement: Movement, stock_before: i64) -> Self {
        let stock_after = movement.kind.apply(stock_before);
        let ecart = match movement.kind {
            MovementKind::Inventory { counted_stock } => {
                Some(i64::from(counted_stock) - stock_before)
            }
            _ => None,
        };
        Self {
            movement,
            stock_before,
            stock_after,
            ecart,
        }
    }

    pub fn sort_key(&self) -> SortKey {
        self.movement.sort_key()
    }
}

/// Sort movements into processing order
pub fn sort_movements(movements: &mut [Movement]) {
    movements.sort_by_key(Movement::sort_key);
}

/// Rebuild the running balance of one lineage from its full history.
///
/// Input order does not matter. Callers pass the movements of a single
/// lineage; use [`Ledger::compute`] for mixed input.
pub fn reconstruct_lineage(mut movements: Vec<Movement>) -> Vec<LedgerEntry> {
    sort_movements(&mut movements);
    fold_from(0, movements)
}

fn fold_from(opening: i64, sorted: Vec<Movement>) -> Vec<LedgerEntry> {
    let mut stock = opening;
    sorted
        .into_iter()
        .map(|movement| {
            let entry = LedgerEntry::apply(movement, stock);
            stock = entry.stock_after;
            entry
        })
        .collect()
}

/// The last inventory of a lineage. Everything before it is absorbed by the
/// count, so replay can restart from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub lineage: LineageKey,
    pub sort_key: SortKey,
    pub stock: i64,
}

/// Find the replay checkpoint of an already reconstructed lineage
pub fn last_checkpoint(entries: &[LedgerEntry]) -> Option<Checkpoint> {
    entries
        .iter()
        .rev()
        .find(|e| e.movement.kind.is_inventory())
        .map(|e| Checkpoint {
            lineage: e.movement.lineage,
            sort_key: e.sort_key(),
            stock: e.stock_after,
        })
}

/// Replay only the movements that sort after `checkpoint`, starting from the
/// counted stock. Movements at or before the checkpoint are ignored.
pub fn replay_from_checkpoint(checkpoint: &Checkpoint, movements: Vec<Movement>) -> Vec<LedgerEntry> {
    let mut tail: Vec<Movement> = movements
        .into_iter()
        .filter(|m| m.sort_key() > checkpoint.sort_key)
        .collect();
    sort_movements(&mut tail);
    fold_from(checkpoint.stock, tail)
}

/// Consolidated state of a reconstructed lineage
pub fn stock_state(lineage: LineageKey, entries: &[LedgerEntry]) -> StockState {
    let last_count = entries.iter().rposition(|e| e.movement.kind.is_inventory());
    let since = last_count.map_or(0, |i| i + 1);

    let (cumul_entries, cumul_exits) = entries[since..].iter().fold((0u64, 0u64), |(i, o), e| {
        (i + e.movement.kind.incoming(), o + e.movement.kind.outgoing())
    });

    let (stock_initial, last_counted_stock, last_ecart, last_inventory_date) = match last_count {
        Some(i) => {
            let entry = &entries[i];
            let counted = match entry.movement.kind {
                MovementKind::Inventory { counted_stock } => Some(counted_stock),
                _ => None,
            };
            (entry.stock_after, counted, entry.ecart, Some(entry.movement.date))
        }
        None => (0, None, None, None),
    };

    StockState {
        lineage,
        stock_initial,
        cumul_entries,
        cumul_exits,
        theoretical_stock: entries.last().map_or(0, |e| e.stock_after),
        last_counted_stock,
        last_ecart,
        last_inventory_date,
    }
}

/// Reconstructed balances of every lineage found in a movement set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    lineages: BTreeMap<LineageKey, Vec<LedgerEntry>>,
}

impl Ledger {
    /// Partition movements by lineage and reconstruct each one independently
    pub fn compute(movements: impl IntoIterator<Item = Movement>) -> Self {
        let mut grouped: BTreeMap<LineageKey, Vec<Movement>> = BTreeMap::new();
        for movement in movements {
            grouped.entry(movement.lineage).or_default().push(movement);
        }
        grouped
            .into_iter()
            .map(|(key, movements)| (key, reconstruct_lineage(movements)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }

    pub fn lineages(&self) -> impl Iterator<Item = &LineageKey> {
        self.lineages.keys()
    }

    /// Annotated history of one lineage, empty when it has no movement
    pub fn entries(&self, lineage: &LineageKey) -> &[LedgerEntry] {
        self.lineages.get(lineage).map_or(&[], Vec::as_slice)
    }

    /// Every annotated row, by lineage then processing order
    pub fn rows(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.lineages.values().flatten()
    }

    /// Theoretical stock after the whole history
    pub fn current_stock(&self, lineage: &LineageKey) -> i64 {
        self.entries(lineage).last().map_or(0, |e| e.stock_after)
    }

    /// Theoretical stock after every movement dated on or before `date`
    pub fn stock_as_of(&self, lineage: &LineageKey, date: NaiveDate) -> i64 {
        self.entries(lineage)
            .iter()
            .take_while(|e| e.movement.date <= date)
            .last()
            .map_or(0, |e| e.stock_after)
    }

    pub fn final_balances(&self) -> BTreeMap<LineageKey, i64> {
        self.lineages
            .iter()
            .map(|(key, entries)| (*key, entries.last().map_or(0, |e| e.stock_after)))
            .collect()
    }

    pub fn state(&self, lineage: &LineageKey) -> StockState {
        stock_state(*lineage, self.entries(lineage))
    }

    pub fn states(&self) -> Vec<StockState> {
        self.lineages
            .iter()
            .map(|(key, entries)| stock_state(*key, entries))
            .collect()
    }

    /// Gate arithmetic against the current theoretical stock of `lineage`
    pub fn check_availability(&self, lineage: &LineageKey, requested: u32) -> AvailabilityCheck {
        check_availability(*lineage, self.current_stock(lineage), requested)
    }

    /// Current stock of every lineage classified against `threshold`
    pub fn stock_levels(&self, threshold: u32) -> Vec<StockLevel> {
        self.final_balances()
            .into_iter()
            .map(|(key, stock)| StockLevel::new(key, stock, threshold))
            .collect()
    }

    /// First entry of each lineage whose balance went below zero with no
    /// count before it
    pub fn unexplained_negatives(&self) -> Vec<&LedgerEntry> {
        self.lineages
            .values()
            .filter_map(|entries| {
                entries
                    .iter()
                    .take_while(|e| !e.movement.kind.is_inventory())
                    .find(|e| e.stock_after < 0)
            })
            .collect()
    }
}

impl FromIterator<(LineageKey, Vec<LedgerEntry>)> for Ledger {
    fn from_iter<I: IntoIterator<Item = (LineageKey, Vec<LedgerEntry>)>>(iter: I) -> Self {
        Self {
            lineages: iter.into_iter().collect(),
        }
    }
}
