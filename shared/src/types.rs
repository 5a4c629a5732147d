//! Common types used across the ledger

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive date window for movement queries. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Window covering the whole history
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// Human-readable period label
    pub fn label(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!("{} - {}", s, e),
            (Some(s), None) => format!("Depuis {}", s),
            (None, Some(e)) => format!("Jusqu'à {}", e),
            (None, None) => "Toutes périodes".to_string(),
        }
    }
}
