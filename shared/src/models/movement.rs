//! Stock movement models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A string that does not name any known variant of a domain enum
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Storage category (warehouse) holding bottles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BouteillesNeuves,
    Consignes,
    StockOutils,
    BouteillesHs,
    Reconfiguration,
    /// Third-party SIGMA depot, tracked for internal use only
    Sigma,
    ParcCe,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::BouteillesNeuves,
        Category::Consignes,
        Category::StockOutils,
        Category::BouteillesHs,
        Category::Reconfiguration,
        Category::Sigma,
        Category::ParcCe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BouteillesNeuves => "bouteilles_neuves",
            Category::Consignes => "consignes",
            Category::StockOutils => "stock_outils",
            Category::BouteillesHs => "bouteilles_hs",
            Category::Reconfiguration => "reconfiguration",
            Category::Sigma => "sigma",
            Category::ParcCe => "parc_ce",
        }
    }

    /// Physical site the warehouse belongs to
    pub fn site(&self) -> Site {
        match self {
            Category::BouteillesNeuves
            | Category::Consignes
            | Category::StockOutils
            | Category::ParcCe => Site::CentreEmplisseur,
            Category::BouteillesHs | Category::Reconfiguration | Category::Sigma => {
                Site::DepotVrac
            }
        }
    }

    /// Internal-only categories never appear in the per-category breakdown,
    /// though their movements still count towards grand totals.
    pub fn is_internal_only(&self) -> bool {
        matches!(self, Category::Sigma)
    }

    /// Whether the warehouse can be either end of a warehouse-to-warehouse transfer
    pub fn accepts_transfers(&self) -> bool {
        !self.is_internal_only()
    }

    /// Client-owned stock has to name the client
    pub fn requires_client(&self) -> bool {
        matches!(self, Category::ParcCe)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::BouteillesNeuves => write!(f, "Bouteilles Neuves - CE"),
            Category::Consignes => write!(f, "Consignes - CE"),
            Category::StockOutils => write!(f, "Stock Outils - CE"),
            Category::BouteillesHs => write!(f, "Bouteilles HS - DV"),
            Category::Reconfiguration => write!(f, "Reconfiguration - DV"),
            Category::Sigma => write!(f, "SIGMA"),
            Category::ParcCe => write!(f, "Parc CE"),
        }
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("category", s))
    }
}

/// Physical site
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    DepotVrac,
    CentreEmplisseur,
}

impl Site {
    pub const ALL: [Site; 2] = [Site::DepotVrac, Site::CentreEmplisseur];

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::DepotVrac => "depot_vrac",
            Site::CentreEmplisseur => "centre_emplisseur",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::DepotVrac => write!(f, "Dépôt Vrac"),
            Site::CentreEmplisseur => write!(f, "Centre Emplisseur"),
        }
    }
}

/// LPG bottle size
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BottleType {
    B6,
    B12,
    B28,
    B38,
}

impl BottleType {
    pub const ALL: [BottleType; 4] = [
        BottleType::B6,
        BottleType::B12,
        BottleType::B28,
        BottleType::B38,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BottleType::B6 => "B6",
            BottleType::B12 => "B12",
            BottleType::B28 => "B28",
            BottleType::B38 => "B38",
        }
    }

    /// Nominal LPG charge in kilograms
    pub fn capacity_kg(&self) -> u32 {
        match self {
            BottleType::B6 => 6,
            BottleType::B12 => 12,
            BottleType::B28 => 28,
            BottleType::B38 => 38,
        }
    }
}

impl fmt::Display for BottleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BottleType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BottleType::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("bottle type", s))
    }
}

/// Marketer owning client-held stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Client {
    PetroIvoire,
    TotalEnergies,
    VivoEnergy,
}

impl Client {
    pub const ALL: [Client; 3] = [
        Client::PetroIvoire,
        Client::TotalEnergies,
        Client::VivoEnergy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Client::PetroIvoire => "petro_ivoire",
            Client::TotalEnergies => "total_energies",
            Client::VivoEnergy => "vivo_energy",
        }
    }

    pub fn short_label(&self) -> &'static str {
        match self {
            Client::PetroIvoire => "PI",
            Client::TotalEnergies => "TOTAL",
            Client::VivoEnergy => "VIVO",
        }
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Client::PetroIvoire => write!(f, "Petro Ivoire"),
            Client::TotalEnergies => write!(f, "TOTAL Energies"),
            Client::VivoEnergy => write!(f, "VIVO Energy"),
        }
    }
}

impl FromStr for Client {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Client::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("client", s))
    }
}

/// Where a bottle comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleOrigin {
    Fabrique,
    Requalifie,
}

impl BottleOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            BottleOrigin::Fabrique => "fabrique",
            BottleOrigin::Requalifie => "requalifie",
        }
    }
}

impl FromStr for BottleOrigin {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fabrique" => Ok(BottleOrigin::Fabrique),
            "requalifie" => Ok(BottleOrigin::Requalifie),
            other => Err(UnknownVariant::new("bottle origin", other)),
        }
    }
}

/// Identifies one independent running-balance series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineageKey {
    pub category: Category,
    pub bottle_type: BottleType,
    pub client: Option<Client>,
}

impl LineageKey {
    pub fn new(category: Category, bottle_type: BottleType, client: Option<Client>) -> Self {
        Self {
            category,
            bottle_type,
            client,
        }
    }

    pub fn site(&self) -> Site {
        self.category.site()
    }

    /// Same bottle type and client, held in another warehouse
    pub fn in_category(&self, category: Category) -> Self {
        Self { category, ..*self }
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.category.as_str(),
            self.bottle_type,
            self.client.map(|c| c.as_str()).unwrap_or("-")
        )
    }
}

/// The three kinds of stock movement. Each variant carries exactly the
/// fields it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementKind {
    /// Bottles received. `source` is set for warehouse-to-warehouse transfers.
    Incoming {
        quantity: u32,
        source: Option<Category>,
    },
    /// Bottles leaving. `destination` is set for warehouse-to-warehouse transfers.
    Outgoing {
        quantity: u32,
        destination: Option<Category>,
    },
    /// Physical count that rebases the theoretical stock
    Inventory { counted_stock: u32 },
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Incoming { .. } => "entree",
            MovementKind::Outgoing { .. } => "sortie",
            MovementKind::Inventory { .. } => "inventaire",
        }
    }

    pub fn is_inventory(&self) -> bool {
        matches!(self, MovementKind::Inventory { .. })
    }

    /// Incoming quantity, zero for other kinds
    pub fn incoming(&self) -> u64 {
        match self {
            MovementKind::Incoming { quantity, .. } => u64::from(*quantity),
            _ => 0,
        }
    }

    /// Outgoing quantity, zero for other kinds
    pub fn outgoing(&self) -> u64 {
        match self {
            MovementKind::Outgoing { quantity, .. } => u64::from(*quantity),
            _ => 0,
        }
    }

    /// Stock after applying this movement to `stock_before`
    pub fn apply(&self, stock_before: i64) -> i64 {
        match self {
            MovementKind::Incoming { quantity, .. } => stock_before + i64::from(*quantity),
            MovementKind::Outgoing { quantity, .. } => stock_before - i64::from(*quantity),
            MovementKind::Inventory { counted_stock } => i64::from(*counted_stock),
        }
    }
}

/// Processing order within a lineage: business day, then insertion time,
/// then id.
pub type SortKey = (NaiveDate, DateTime<Utc>, Uuid);

/// An immutable stock movement as held by the movement store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    /// Business day
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub lineage: LineageKey,
    pub kind: MovementKind,
    /// Delivery note ("bon") number
    pub document_ref: Option<String>,
    pub origin: Option<BottleOrigin>,
    /// Mirror movement written by the same transfer
    pub linked_movement_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl Movement {
    pub fn sort_key(&self) -> SortKey {
        (self.date, self.created_at, self.id)
    }

    pub fn site(&self) -> Site {
        self.lineage.site()
    }

    /// Upstream lineage an incoming transfer draws from
    pub fn source_lineage(&self) -> Option<LineageKey> {
        match self.kind {
            MovementKind::Incoming {
                source: Some(source),
                ..
            } => Some(self.lineage.in_category(source)),
            _ => None,
        }
    }

    /// Other warehouse involved when this movement is one side of a transfer
    pub fn transfer_counterpart(&self) -> Option<Category> {
        match self.kind {
            MovementKind::Incoming { source, .. } => source,
            MovementKind::Outgoing { destination, .. } => destination,
            MovementKind::Inventory { .. } => None,
        }
    }
}

/// A validated movement not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub date: NaiveDate,
    pub lineage: LineageKey,
    pub kind: MovementKind,
    pub document_ref: Option<String>,
    pub origin: Option<BottleOrigin>,
    pub notes: Option<String>,
}

impl NewMovement {
    pub fn into_movement(self, id: Uuid, created_at: DateTime<Utc>) -> Movement {
        Movement {
            id,
            date: self.date,
            created_at,
            lineage: self.lineage,
            kind: self.kind,
            document_ref: self.document_ref,
            origin: self.origin,
            linked_movement_id: None,
            notes: self.notes,
        }
    }
}
