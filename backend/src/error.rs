//! Error handling for the LPG stock ledger
//!
//! Provides consistent error details in English and French

use serde::Serialize;
use shared::{Shortfall, ValidationError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_fr: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Insufficient stock for {} bottle type(s)", .shortfalls.len())]
    InsufficientStock { shortfalls: Vec<Shortfall> },

    // Store errors
    #[error("Movement store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error")]
    InternalError(#[from] anyhow::Error),
}

/// Error body reported to callers
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_fr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shortfalls: Vec<Shortfall>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: String, message_fr: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_fr,
            field: None,
            shortfalls: Vec::new(),
        }
    }
}

impl AppError {
    /// Business rejections the caller can fix by changing the request, as
    /// opposed to system faults
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. } | AppError::NotFound(_) | AppError::InsufficientStock { .. }
        )
    }

    pub fn detail(&self) -> ErrorDetail {
        match self {
            AppError::Validation {
                field,
                message,
                message_fr,
            } => ErrorDetail {
                field: Some(field.clone()),
                ..ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_fr.clone())
            },
            AppError::NotFound(resource) => ErrorDetail::new(
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("{} introuvable", resource),
            ),
            AppError::InsufficientStock { shortfalls } => {
                let lines_en: Vec<String> = shortfalls
                    .iter()
                    .map(|s| format!("{}: {} requested, {} available", s.bottle_type, s.requested, s.current_stock))
                    .collect();
                let lines_fr: Vec<String> = shortfalls
                    .iter()
                    .map(|s| format!("{}: {} demandé, {} disponible", s.bottle_type, s.requested, s.current_stock))
                    .collect();
                ErrorDetail {
                    shortfalls: shortfalls.clone(),
                    ..ErrorDetail::new(
                        "INSUFFICIENT_STOCK",
                        format!("Insufficient stock:\n{}", lines_en.join("\n")),
                        format!("Stock insuffisant:\n{}", lines_fr.join("\n")),
                    )
                }
            }
            AppError::Store(msg) => ErrorDetail::new(
                "STORE_ERROR",
                format!("Movement store error: {}", msg),
                format!("Erreur du stockage des mouvements : {}", msg),
            ),
            AppError::Configuration(msg) => ErrorDetail::new(
                "CONFIGURATION_ERROR",
                format!("Configuration error: {}", msg),
                format!("Erreur de configuration : {}", msg),
            ),
            AppError::Internal(msg) => ErrorDetail::new(
                "INTERNAL_ERROR",
                msg.clone(),
                "Erreur interne".to_string(),
            ),
            AppError::InternalError(_) => ErrorDetail::new(
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                "Une erreur interne est survenue".to_string(),
            ),
        }
    }

    /// Log the error at a level matching its kind and return its detail
    pub fn report(&self) -> ErrorDetail {
        if self.is_recoverable() {
            tracing::debug!("Rejected: {}", self);
        } else {
            tracing::error!("Error: {:?}", self);
        }
        self.detail()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let message_fr = match &err {
            ValidationError::Field { field, message } => {
                format!("Champ {} invalide : {}", field, message)
            }
            ValidationError::Unknown { field, value } => {
                format!("Valeur inconnue pour {} : {}", field, value)
            }
            ValidationError::Missing { field, context } => {
                format!("{} est obligatoire pour {}", field, context)
            }
            ValidationError::FutureDate { .. } => {
                "Les dates futures ne sont pas autorisées".to_string()
            }
            ValidationError::SelfTransfer { category } => {
                format!("Les entrepôts source et destination sont identiques ({})", category)
            }
            ValidationError::EmptyTransfer => {
                "Au moins une quantité doit être supérieure à 0".to_string()
            }
        };
        AppError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
            message_fr,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
