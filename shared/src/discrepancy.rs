//! Discrepancy detection over reconciliation snapshots

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{LineageKey, StockState};

/// Écart (in bottles) above which a count is reported when the caller does
/// not supply a threshold
pub const DEFAULT_DISCREPANCY_THRESHOLD: u32 = 10;

/// Latest significant écart of one lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyRecord {
    pub lineage: LineageKey,
    pub ecart: i64,
    pub date: NaiveDate,
}

/// Lineages whose last écart exceeds `threshold` in absolute value, largest
/// first. Lineages never counted carry no signal.
pub fn detect_discrepancies(states: &[StockState], threshold: u32) -> Vec<DiscrepancyRecord> {
    let threshold = i64::from(threshold);
    let mut records: Vec<DiscrepancyRecord> = states
        .iter()
        .filter_map(|state| {
            let ecart = state.last_ecart?;
            let date = state.last_inventory_date?;
            (ecart.abs() > threshold).then_some(DiscrepancyRecord {
                lineage: state.lineage,
                ecart,
                date,
            })
        })
        .collect();

    records.sort_by(|a, b| {
        b.ecart
            .abs()
            .cmp(&a.ecart.abs())
            .then_with(|| a.lineage.cmp(&b.lineage))
    });
    records
}
