//! Stock state models

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::LineageKey;

/// Consolidated state of one lineage at the end of its history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockState {
    pub lineage: LineageKey,
    /// Last counted stock, or 0 when the lineage was never counted
    pub stock_initial: i64,
    /// Entries since the last count
    pub cumul_entries: u64,
    /// Exits since the last count
    pub cumul_exits: u64,
    pub theoretical_stock: i64,
    pub last_counted_stock: Option<u32>,
    pub last_ecart: Option<i64>,
    pub last_inventory_date: Option<NaiveDate>,
}

impl StockState {
    /// Écart of the last count, 0 when the lineage was never counted
    pub fn ecart_or_zero(&self) -> i64 {
        self.last_ecart.unwrap_or(0)
    }
}

/// Stock level indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Ok,
    Low,
    Empty,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Ok => "ok",
            StockStatus::Low => "low",
            StockStatus::Empty => "empty",
        }
    }
}

/// Classify a stock figure against an alert threshold
pub fn stock_status(current: i64, threshold: u32) -> StockStatus {
    if current <= 0 {
        StockStatus::Empty
    } else if current <= i64::from(threshold) {
        StockStatus::Low
    } else {
        StockStatus::Ok
    }
}

/// Share of `total` represented by `current`, in percent rounded half-up to
/// one decimal. Zero when `total` is not positive.
pub fn stock_percentage(current: i64, total: i64) -> Decimal {
    if total <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(current) / Decimal::from(total) * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Current stock of one lineage with its alert status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub lineage: LineageKey,
    pub current_stock: i64,
    pub threshold: u32,
    pub status: StockStatus,
}

impl StockLevel {
    pub fn new(lineage: LineageKey, current_stock: i64, threshold: u32) -> Self {
        Self {
            lineage,
            current_stock,
            threshold,
            status: stock_status(current_stock, threshold),
        }
    }
}
