//! Multi-dimensional stock summaries
//!
//! Entries and exits are flows summed over a date window. Theoretical stock is
//! the current balance of each lineage, whatever the window.
//!
//! The category view leaves out internal-only warehouses. Grand totals are
//! computed separately from the buckets and always include them, so in the
//! category view the buckets may not add up to the total.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::{Ledger, LedgerEntry};
use crate::models::{BottleType, Category, LineageKey, Site};
use crate::types::DateWindow;

/// Dimension a summary is grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingDimension {
    Category,
    Site,
    BottleType,
}

impl GroupingDimension {
    pub const ALL: [GroupingDimension; 3] = [
        GroupingDimension::Category,
        GroupingDimension::Site,
        GroupingDimension::BottleType,
    ];

    /// Bucket a lineage falls into, `None` when the view leaves it out
    pub fn bucket_of(&self, lineage: &LineageKey) -> Option<BucketKey> {
        match self {
            GroupingDimension::Category if lineage.category.is_internal_only() => None,
            GroupingDimension::Category => Some(BucketKey::Category(lineage.category)),
            GroupingDimension::Site => Some(BucketKey::Site(lineage.site())),
            GroupingDimension::BottleType => Some(BucketKey::BottleType(lineage.bottle_type)),
        }
    }

    /// Whether the buckets of this view always add up to the grand total
    pub fn has_exclusions(&self) -> bool {
        matches!(self, GroupingDimension::Category)
    }

    fn keys(&self) -> Vec<BucketKey> {
        match self {
            GroupingDimension::Category => Category::ALL
                .into_iter()
                .filter(|c| !c.is_internal_only())
                .map(BucketKey::Category)
                .collect(),
            GroupingDimension::Site => Site::ALL.into_iter().map(BucketKey::Site).collect(),
            GroupingDimension::BottleType => BottleType::ALL
                .into_iter()
                .map(BucketKey::BottleType)
                .collect(),
        }
    }
}

impl std::str::FromStr for GroupingDimension {
    type Err = crate::models::UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(GroupingDimension::Category),
            "site" => Ok(GroupingDimension::Site),
            "bottle_type" => Ok(GroupingDimension::BottleType),
            other => Err(crate::models::UnknownVariant {
                kind: "grouping dimension",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "dimension", content = "value", rename_all = "snake_case")]
pub enum BucketKey {
    Category(Category),
    Site(Site),
    BottleType(BottleType),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationBucket {
    pub entries: u64,
    pub exits: u64,
    pub theoretical_stock: i64,
}

impl AggregationBucket {
    fn add_flows(&mut self, entry: &LedgerEntry) {
        self.entries += entry.movement.kind.incoming();
        self.exits += entry.movement.kind.outgoing();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub entries: u64,
    pub exits: u64,
    pub theoretical_stock: i64,
    /// Sum of absolute écarts of the counts inside the window
    pub absolute_ecarts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub period: String,
    pub dimension: GroupingDimension,
    pub buckets: Vec<(BucketKey, AggregationBucket)>,
    pub total: Totals,
}

impl StockSummary {
    pub fn bucket(&self, key: BucketKey) -> Option<&AggregationBucket> {
        self.buckets.iter().find(|(k, _)| *k == key).map(|(_, b)| b)
    }

    /// Field-wise sum of the buckets
    pub fn bucket_sum(&self) -> AggregationBucket {
        self.buckets
            .iter()
            .fold(AggregationBucket::default(), |acc, (_, b)| AggregationBucket {
                entries: acc.entries + b.entries,
                exits: acc.exits + b.exits,
                theoretical_stock: acc.theoretical_stock + b.theoretical_stock,
            })
    }
}

/// Group window rows and current balances along `dimension`.
///
/// Every value of the dimension gets a bucket, empty or not.
pub fn summarize<'a>(
    window_rows: impl IntoIterator<Item = &'a LedgerEntry>,
    balances: &BTreeMap<LineageKey, i64>,
    dimension: GroupingDimension,
) -> StockSummary {
    let mut buckets: BTreeMap<BucketKey, AggregationBucket> = dimension
        .keys()
        .into_iter()
        .map(|k| (k, AggregationBucket::default()))
        .collect();
    let mut total = Totals::default();

    for entry in window_rows {
        total.entries += entry.movement.kind.incoming();
        total.exits += entry.movement.kind.outgoing();
        total.absolute_ecarts += entry.ecart.map_or(0, i64::unsigned_abs);

        if let Some(key) = dimension.bucket_of(&entry.movement.lineage) {
            buckets.entry(key).or_default().add_flows(entry);
        }
    }

    for (lineage, stock) in balances {
        total.theoretical_stock += stock;
        if let Some(key) = dimension.bucket_of(lineage) {
            buckets.entry(key).or_default().theoretical_stock += stock;
        }
    }

    StockSummary {
        period: DateWindow::all().label(),
        dimension,
        buckets: buckets.into_iter().collect(),
        total,
    }
}

/// Summary of the ledger rows dated inside `window`
pub fn summarize_window(ledger: &Ledger, window: DateWindow, dimension: GroupingDimension) -> StockSummary {
    let rows = ledger.rows().filter(|e| window.contains(e.movement.date));
    StockSummary {
        period: window.label(),
        ..summarize(rows, &ledger.final_balances(), dimension)
    }
}

/// Headline movement counters for a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementStats {
    pub movements: usize,
    pub entries: u64,
    pub exits: u64,
    pub inventories: usize,
    pub absolute_ecarts: u64,
}

pub fn movement_stats<'a>(rows: impl IntoIterator<Item = &'a LedgerEntry>, window: DateWindow) -> MovementStats {
    rows.into_iter()
        .filter(|e| window.contains(e.movement.date))
        .fold(MovementStats::default(), |mut stats, e| {
            stats.movements += 1;
            stats.entries += e.movement.kind.incoming();
            stats.exits += e.movement.kind.outgoing();
            if e.movement.kind.is_inventory() {
                stats.inventories += 1;
            }
            stats.absolute_ecarts += e.ecart.map_or(0, i64::unsigned_abs);
            stats
        })
}
