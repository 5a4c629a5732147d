//! Validation of raw movement input
//!
//! Callers submit movements with string enums and signed integers. Everything
//! is checked here, before anything reaches the movement store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::availability::TransferRequest;
use crate::models::{
    BottleOrigin, BottleType, Category, Client, LineageKey, MovementKind, NewMovement,
    UnknownVariant,
};

/// Structured rejection of a movement input
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("{field}: {message}")]
    Field { field: String, message: String },

    #[error("{field}: unknown value '{value}'")]
    Unknown { field: String, value: String },

    #[error("{field} is required for {context}")]
    Missing { field: String, context: String },

    #[error("date {date} is in the future")]
    FutureDate { date: NaiveDate },

    #[error("transfer source and destination are both {category}")]
    SelfTransfer { category: String },

    #[error("at least one quantity must be greater than 0")]
    EmptyTransfer,
}

impl ValidationError {
    /// Name of the offending input field
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Field { field, .. }
            | ValidationError::Unknown { field, .. }
            | ValidationError::Missing { field, .. } => field,
            ValidationError::FutureDate { .. } => "date",
            ValidationError::SelfTransfer { .. } => "destination_warehouse",
            ValidationError::EmptyTransfer => "lines",
        }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn missing(field: &str, context: &str) -> Self {
        ValidationError::Missing {
            field: field.to_string(),
            context: context.to_string(),
        }
    }

    fn unknown(field: &str, err: UnknownVariant) -> Self {
        ValidationError::Unknown {
            field: field.to_string(),
            value: err.value,
        }
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        match fields.first() {
            Some((field, errs)) => {
                let message = match errs.first().map(|e| e.code.as_ref()) {
                    Some("range") => "must not be negative",
                    Some("length") => "is too long",
                    _ => "is invalid",
                };
                ValidationError::invalid(field, message)
            }
            None => ValidationError::invalid("input", "is invalid"),
        }
    }
}

/// Raw movement as submitted by a caller
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MovementInput {
    /// `entree`, `sortie` or `inventaire`
    pub movement_type: String,
    pub date: NaiveDate,
    pub category: String,
    pub bottle_type: String,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub counted_stock: Option<i32>,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub document_ref: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub source_warehouse: Option<String>,
    #[serde(default)]
    pub destination_warehouse: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// One bottle type of a multi-type transfer submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLineInput {
    pub bottle_type: String,
    pub quantity: i32,
}

/// Raw warehouse-to-warehouse transfer covering several bottle types
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferInput {
    pub date: NaiveDate,
    pub source_warehouse: String,
    pub destination_warehouse: String,
    #[serde(default)]
    pub client: Option<String>,
    pub lines: Vec<TransferLineInput>,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub document_ref: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Validate a raw movement and turn it into a typed one.
///
/// `today` is the last business day a movement may be dated.
pub fn validate_movement(
    input: &MovementInput,
    today: NaiveDate,
) -> Result<NewMovement, ValidationError> {
    input.validate()?;

    let category = parse_category("category", &input.category)?;
    let bottle_type: BottleType = input
        .bottle_type
        .parse()
        .map_err(|e| ValidationError::unknown("bottle_type", e))?;
    let client = parse_client(input.client.as_deref(), category, category)?;
    let origin = parse_origin(input.origin.as_deref())?;
    validate_date(input.date, today)?;

    let kind = match input.movement_type.as_str() {
        "entree" | "incoming" => {
            if input.destination_warehouse.is_some() {
                return Err(ValidationError::invalid(
                    "destination_warehouse",
                    "only applies to outgoing movements",
                ));
            }
            let source = parse_counterpart("source_warehouse", input.source_warehouse.as_deref())?;
            if let Some(source) = source {
                validate_transfer_endpoints(source, category)?;
            }
            MovementKind::Incoming {
                quantity: required_quantity(input, "entree")?,
                source,
            }
        }
        "sortie" | "outgoing" => {
            if input.source_warehouse.is_some() {
                return Err(ValidationError::invalid(
                    "source_warehouse",
                    "only applies to incoming movements",
                ));
            }
            let destination = parse_counterpart(
                "destination_warehouse",
                input.destination_warehouse.as_deref(),
            )?;
            if let Some(destination) = destination {
                validate_transfer_endpoints(category, destination)?;
            }
            MovementKind::Outgoing {
                quantity: required_quantity(input, "sortie")?,
                destination,
            }
        }
        "inventaire" | "inventory" => {
            if input.quantity.is_some() {
                return Err(ValidationError::invalid(
                    "quantity",
                    "an inventory carries a counted stock, not a quantity",
                ));
            }
            if input.source_warehouse.is_some() || input.destination_warehouse.is_some() {
                return Err(ValidationError::invalid(
                    "source_warehouse",
                    "an inventory cannot be a transfer",
                ));
            }
            let counted = input
                .counted_stock
                .ok_or_else(|| ValidationError::missing("counted_stock", "inventaire"))?;
            MovementKind::Inventory {
                counted_stock: to_quantity("counted_stock", counted)?,
            }
        }
        other => {
            return Err(ValidationError::Unknown {
                field: "movement_type".to_string(),
                value: other.to_string(),
            })
        }
    };

    Ok(NewMovement {
        date: input.date,
        lineage: LineageKey::new(category, bottle_type, client),
        kind,
        document_ref: non_blank(input.document_ref.as_deref()),
        origin,
        notes: non_blank(input.notes.as_deref()),
    })
}

/// Validate a multi-bottle-type transfer. Lines with the same bottle type are
/// merged and zero lines are dropped.
pub fn validate_transfer(
    input: &TransferInput,
    today: NaiveDate,
) -> Result<TransferRequest, ValidationError> {
    input.validate()?;

    let source = parse_category("source_warehouse", &input.source_warehouse)?;
    let destination = parse_category("destination_warehouse", &input.destination_warehouse)?;
    validate_transfer_endpoints(source, destination)?;
    let client = parse_client(input.client.as_deref(), source, destination)?;
    let origin = parse_origin(input.origin.as_deref())?;
    validate_date(input.date, today)?;

    let mut lines: Vec<(BottleType, u32)> = Vec::new();
    for line in &input.lines {
        let bottle_type: BottleType = line
            .bottle_type
            .parse()
            .map_err(|e| ValidationError::unknown("bottle_type", e))?;
        let quantity = to_quantity("quantity", line.quantity)?;
        match lines.iter_mut().find(|(b, _)| *b == bottle_type) {
            Some((_, total)) => {
                *total = total
                    .checked_add(quantity)
                    .ok_or_else(|| ValidationError::invalid("quantity", "exceeds the maximum"))?;
            }
            None => lines.push((bottle_type, quantity)),
        }
    }
    validate_transfer_lines(&lines)?;
    lines.retain(|(_, q)| *q > 0);
    lines.sort_by_key(|(b, _)| *b);

    Ok(TransferRequest {
        date: input.date,
        source,
        destination,
        client,
        lines,
        document_ref: non_blank(input.document_ref.as_deref()),
        origin,
        notes: non_blank(input.notes.as_deref()),
    })
}

/// A multi-type submission needs at least one positive quantity
pub fn validate_transfer_lines(lines: &[(BottleType, u32)]) -> Result<(), ValidationError> {
    if lines.iter().all(|(_, q)| *q == 0) {
        return Err(ValidationError::EmptyTransfer);
    }
    Ok(())
}

fn parse_category(field: &str, value: &str) -> Result<Category, ValidationError> {
    value
        .parse()
        .map_err(|e| ValidationError::unknown(field, e))
}

fn parse_counterpart(field: &str, value: Option<&str>) -> Result<Option<Category>, ValidationError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_category(field, v).map(Some),
        None => Ok(None),
    }
}

/// Client is required as soon as one of the warehouses holds client-owned stock
fn parse_client(
    value: Option<&str>,
    category: Category,
    other: Category,
) -> Result<Option<Client>, ValidationError> {
    let client = match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Some(
            v.parse::<Client>()
                .map_err(|e| ValidationError::unknown("client", e))?,
        ),
        None => None,
    };
    if client.is_none() && (category.requires_client() || other.requires_client()) {
        return Err(ValidationError::missing("client", "parc_ce"));
    }
    Ok(client)
}

fn parse_origin(value: Option<&str>) -> Result<Option<BottleOrigin>, ValidationError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| ValidationError::unknown("origin", e)),
        None => Ok(None),
    }
}

fn validate_date(date: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if date > today {
        return Err(ValidationError::FutureDate { date });
    }
    Ok(())
}

fn validate_transfer_endpoints(source: Category, destination: Category) -> Result<(), ValidationError> {
    if source == destination {
        return Err(ValidationError::SelfTransfer {
            category: source.as_str().to_string(),
        });
    }
    for (field, category) in [("source_warehouse", source), ("destination_warehouse", destination)] {
        if !category.accepts_transfers() {
            return Err(ValidationError::invalid(
                field,
                format!("{} cannot take part in transfers", category.as_str()),
            ));
        }
    }
    Ok(())
}

fn required_quantity(input: &MovementInput, movement_type: &str) -> Result<u32, ValidationError> {
    if input.counted_stock.is_some() {
        return Err(ValidationError::invalid(
            "counted_stock",
            "only applies to inventory movements",
        ));
    }
    let quantity = input
        .quantity
        .ok_or_else(|| ValidationError::missing("quantity", movement_type))?;
    to_quantity("quantity", quantity)
}

fn to_quantity(field: &str, value: i32) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::invalid(field, "must not be negative"));
    }
    u32::try_from(value).map_err(|_| ValidationError::invalid(field, "exceeds the maximum"))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
