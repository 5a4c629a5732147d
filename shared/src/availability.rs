//! Cross-warehouse availability gate
//!
//! A transfer draws bottles from an upstream lineage. It is admitted only when
//! the upstream theoretical stock covers every requested bottle type; a single
//! failing line rejects the whole request.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::Ledger;
use crate::models::{
    BottleOrigin, BottleType, Category, Client, LineageKey, MovementKind, NewMovement,
};

/// Result of comparing an upstream stock with a requested quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    pub lineage: LineageKey,
    pub current_stock: i64,
    pub requested: u32,
    pub available: bool,
    /// Missing bottles, 0 when available
    pub shortfall: i64,
}

pub fn check_availability(lineage: LineageKey, current_stock: i64, requested: u32) -> AvailabilityCheck {
    let requested_stock = i64::from(requested);
    AvailabilityCheck {
        lineage,
        current_stock,
        requested,
        available: current_stock >= requested_stock,
        shortfall: (requested_stock - current_stock).max(0),
    }
}

/// A validated warehouse-to-warehouse transfer, one line per bottle type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub date: NaiveDate,
    pub source: Category,
    pub destination: Category,
    pub client: Option<Client>,
    pub lines: Vec<(BottleType, u32)>,
    pub document_ref: Option<String>,
    pub origin: Option<BottleOrigin>,
    pub notes: Option<String>,
}

impl TransferRequest {
    /// Treat a single movement naming a counterpart warehouse as a one-line
    /// transfer. Returns `None` for plain movements.
    pub fn from_movement(movement: &NewMovement) -> Option<Self> {
        let lineage = movement.lineage;
        let (source, destination, quantity) = match movement.kind {
            MovementKind::Incoming {
                quantity,
                source: Some(source),
            } => (source, lineage.category, quantity),
            MovementKind::Outgoing {
                quantity,
                destination: Some(destination),
            } => (lineage.category, destination, quantity),
            _ => return None,
        };
        Some(Self {
            date: movement.date,
            source,
            destination,
            client: lineage.client,
            lines: vec![(lineage.bottle_type, quantity)],
            document_ref: movement.document_ref.clone(),
            origin: movement.origin,
            notes: movement.notes.clone(),
        })
    }

    pub fn source_lineage(&self, bottle_type: BottleType) -> LineageKey {
        LineageKey::new(self.source, bottle_type, self.client)
    }

    pub fn destination_lineage(&self, bottle_type: BottleType) -> LineageKey {
        LineageKey::new(self.destination, bottle_type, self.client)
    }

    /// Every lineage the transfer writes to, sorted and deduplicated
    pub fn lineages(&self) -> Vec<LineageKey> {
        let mut keys: Vec<LineageKey> = self
            .lines
            .iter()
            .flat_map(|(b, _)| [self.source_lineage(*b), self.destination_lineage(*b)])
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// The outgoing/incoming pair written for each line, in line order
    pub fn mirror_pairs(&self) -> Vec<(NewMovement, NewMovement)> {
        self.lines
            .iter()
            .map(|&(bottle_type, quantity)| {
                let outgoing = self.movement(
                    self.source_lineage(bottle_type),
                    MovementKind::Outgoing {
                        quantity,
                        destination: Some(self.destination),
                    },
                );
                let incoming = self.movement(
                    self.destination_lineage(bottle_type),
                    MovementKind::Incoming {
                        quantity,
                        source: Some(self.source),
                    },
                );
                (outgoing, incoming)
            })
            .collect()
    }

    fn movement(&self, lineage: LineageKey, kind: MovementKind) -> NewMovement {
        NewMovement {
            date: self.date,
            lineage,
            kind,
            document_ref: self.document_ref.clone(),
            origin: self.origin,
            notes: self.notes.clone(),
        }
    }
}

/// One bottle type the source cannot cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub bottle_type: BottleType,
    pub current_stock: i64,
    pub requested: u32,
    pub missing: i64,
}

/// Per-line gate results of a transfer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferVerdict {
    pub checks: Vec<AvailabilityCheck>,
}

impl TransferVerdict {
    pub fn is_admissible(&self) -> bool {
        self.checks.iter().all(|c| c.available)
    }

    pub fn shortfalls(&self) -> Vec<Shortfall> {
        self.checks
            .iter()
            .filter(|c| !c.available)
            .map(|c| Shortfall {
                bottle_type: c.lineage.bottle_type,
                current_stock: c.current_stock,
                requested: c.requested,
                missing: c.shortfall,
            })
            .collect()
    }
}

/// Check every line of `request` against the source lineages in `ledger`
pub fn evaluate_transfer(ledger: &Ledger, request: &TransferRequest) -> TransferVerdict {
    TransferVerdict {
        checks: request
            .lines
            .iter()
            .map(|&(bottle_type, quantity)| {
                ledger.check_availability(&request.source_lineage(bottle_type), quantity)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Movement;
    use chrono::Utc;
    use uuid::Uuid;

    fn key(bottle_type: BottleType) -> LineageKey {
        LineageKey::new(Category::BouteillesNeuves, bottle_type, None)
    }

    fn stocked(bottle_type: BottleType, quantity: u32) -> Movement {
        NewMovement {
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            lineage: key(bottle_type),
            kind: MovementKind::Incoming {
                quantity,
                source: None,
            },
            document_ref: None,
            origin: None,
            notes: None,
        }
        .into_movement(Uuid::new_v4(), Utc::now())
    }

    fn request(lines: Vec<(BottleType, u32)>) -> TransferRequest {
        TransferRequest {
            date: NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
            source: Category::BouteillesNeuves,
            destination: Category::Consignes,
            client: None,
            lines,
            document_ref: Some("BT-7".to_string()),
            origin: None,
            notes: None,
        }
    }

    #[test]
    fn test_gate_arithmetic() {
        let short = check_availability(key(BottleType::B12), 100, 150);
        assert!(!short.available);
        assert_eq!(short.shortfall, 50);

        let exact = check_availability(key(BottleType::B12), 100, 100);
        assert!(exact.available);
        assert_eq!(exact.shortfall, 0);
    }

    #[test]
    fn test_negative_source_shortfall_counts_full_deficit() {
        let check = check_availability(key(BottleType::B6), -20, 10);
        assert_eq!(check.shortfall, 30);
    }

    #[test]
    fn test_one_failing_line_rejects_request() {
        let ledger = Ledger::compute(vec![
            stocked(BottleType::B6, 50),
            stocked(BottleType::B12, 10),
        ]);
        let verdict = evaluate_transfer(&ledger, &request(vec![(BottleType::B6, 40), (BottleType::B12, 15)]));

        assert!(!verdict.is_admissible());
        assert_eq!(
            verdict.shortfalls(),
            vec![Shortfall {
                bottle_type: BottleType::B12,
                current_stock: 10,
                requested: 15,
                missing: 5,
            }]
        );
    }

    #[test]
    fn test_mirror_pairs() {
        let pairs = request(vec![(BottleType::B28, 4)]).mirror_pairs();
        let (outgoing, incoming) = &pairs[0];

        assert_eq!(outgoing.lineage, key(BottleType::B28));
        assert_eq!(
            outgoing.kind,
            MovementKind::Outgoing {
                quantity: 4,
                destination: Some(Category::Consignes)
            }
        );
        assert_eq!(incoming.lineage.category, Category::Consignes);
        assert_eq!(
            incoming.kind,
            MovementKind::Incoming {
                quantity: 4,
                source: Some(Category::BouteillesNeuves)
            }
        );
        assert_eq!(incoming.document_ref.as_deref(), Some("BT-7"));
    }

    #[test]
    fn test_from_movement() {
        let movement = NewMovement {
            date: NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
            lineage: LineageKey::new(Category::Consignes, BottleType::B6, None),
            kind: MovementKind::Incoming {
                quantity: 9,
                source: Some(Category::StockOutils),
            },
            document_ref: None,
            origin: None,
            notes: None,
        };
        let request = TransferRequest::from_movement(&movement).unwrap();
        assert_eq!(request.source, Category::StockOutils);
        assert_eq!(request.destination, Category::Consignes);
        assert_eq!(request.lines, vec![(BottleType::B6, 9)]);

        let plain = NewMovement {
            kind: MovementKind::Incoming {
                quantity: 9,
                source: None,
            },
            ..movement
        };
        assert!(TransferRequest::from_movement(&plain).is_none());
    }

    #[test]
    fn test_lineages_sorted() {
        let keys = request(vec![(BottleType::B12, 1), (BottleType::B6, 1)]).lineages();
        assert_eq!(keys.len(), 4);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}
