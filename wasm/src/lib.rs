//! WebAssembly module for the LPG stock ledger
//!
//! Provides client-side computation for:
//! - Ledger reconstruction and stock states
//! - Transfer availability previews
//! - Discrepancy detection and stock summaries
//! - Movement validation before submission
//!
//! Every function takes and returns JSON strings.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use shared::{
    DateWindow, GroupingDimension, Ledger, LineageKey, Movement, MovementInput, TransferInput,
    DEFAULT_DISCREPANCY_THRESHOLD,
};

fn to_js(result: Result<String, String>) -> Result<String, JsValue> {
    result.map_err(|e| JsValue::from_str(&e))
}

fn parse_movements(movements_json: &str) -> Result<Ledger, String> {
    let movements: Vec<Movement> =
        serde_json::from_str(movements_json).map_err(|e| format!("Invalid movements JSON: {}", e))?;
    Ok(Ledger::compute(movements))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    value
        .parse()
        .map_err(|e| format!("Invalid {} '{}': {}", field, value, e))
}

fn parse_optional_date(field: &str, value: Option<String>) -> Result<Option<NaiveDate>, String> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| parse_date(field, &v))
        .transpose()
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn ledger_rows(movements_json: &str) -> Result<String, String> {
    let ledger = parse_movements(movements_json)?;
    to_json(&ledger.rows().collect::<Vec<_>>())
}

fn ledger_states(movements_json: &str) -> Result<String, String> {
    to_json(&parse_movements(movements_json)?.states())
}

fn availability(movements_json: &str, lineage_json: &str, requested: u32) -> Result<String, String> {
    let lineage: LineageKey =
        serde_json::from_str(lineage_json).map_err(|e| format!("Invalid lineage JSON: {}", e))?;
    to_json(&parse_movements(movements_json)?.check_availability(&lineage, requested))
}

fn transfer_preview(movements_json: &str, transfer_json: &str, today: &str) -> Result<String, String> {
    let input: TransferInput =
        serde_json::from_str(transfer_json).map_err(|e| format!("Invalid transfer JSON: {}", e))?;
    let request = shared::validate_transfer(&input, parse_date("today", today)?)
        .map_err(|e| e.to_string())?;
    to_json(&shared::evaluate_transfer(&parse_movements(movements_json)?, &request))
}

fn discrepancies(movements_json: &str, threshold: Option<u32>) -> Result<String, String> {
    let states = parse_movements(movements_json)?.states();
    to_json(&shared::detect_discrepancies(
        &states,
        threshold.unwrap_or(DEFAULT_DISCREPANCY_THRESHOLD),
    ))
}

fn summary(
    movements_json: &str,
    dimension: &str,
    start: Option<String>,
    end: Option<String>,
) -> Result<String, String> {
    let dimension: GroupingDimension = dimension.parse().map_err(|e: shared::UnknownVariant| e.to_string())?;
    let window = DateWindow::new(
        parse_optional_date("start", start)?,
        parse_optional_date("end", end)?,
    );
    to_json(&shared::summarize_window(&parse_movements(movements_json)?, window, dimension))
}

fn movement_validation(input_json: &str, today: &str) -> Result<String, String> {
    let input: MovementInput =
        serde_json::from_str(input_json).map_err(|e| format!("Invalid movement JSON: {}", e))?;
    match shared::validate_movement(&input, parse_date("today", today)?) {
        Ok(movement) => to_json(&movement),
        // Rejections are data for the form, not failures
        Err(rejection) => to_json(&rejection),
    }
}

/// Annotated rows of every lineage
#[wasm_bindgen]
pub fn compute_ledger(movements_json: &str) -> Result<String, JsValue> {
    to_js(ledger_rows(movements_json))
}

#[wasm_bindgen]
pub fn compute_stock_states(movements_json: &str) -> Result<String, JsValue> {
    to_js(ledger_states(movements_json))
}

/// Whether a lineage can supply `requested` bottles
#[wasm_bindgen]
pub fn check_availability(movements_json: &str, lineage_json: &str, requested: u32) -> Result<String, JsValue> {
    to_js(availability(movements_json, lineage_json, requested))
}

/// Per-bottle-type gate results for a transfer form
#[wasm_bindgen]
pub fn preview_transfer(movements_json: &str, transfer_json: &str, today: &str) -> Result<String, JsValue> {
    to_js(transfer_preview(movements_json, transfer_json, today))
}

#[wasm_bindgen]
pub fn detect_discrepancies(movements_json: &str, threshold: Option<u32>) -> Result<String, JsValue> {
    to_js(discrepancies(movements_json, threshold))
}

/// Stock summary grouped by `category`, `site` or `bottle_type`. Dates are
/// `YYYY-MM-DD`, empty or missing for an open bound.
#[wasm_bindgen]
pub fn summarize(
    movements_json: &str,
    dimension: &str,
    start: Option<String>,
    end: Option<String>,
) -> Result<String, JsValue> {
    to_js(summary(movements_json, dimension, start, end))
}

/// Validated movement, or the structured rejection
#[wasm_bindgen]
pub fn validate_movement(input_json: &str, today: &str) -> Result<String, JsValue> {
    to_js(movement_validation(input_json, today))
}

/// Share of `total` held by `current`, in percent with one decimal
#[wasm_bindgen]
pub fn stock_percentage(current: i32, total: i32) -> f64 {
    shared::stock_percentage(i64::from(current), i64::from(total))
        .to_f64()
        .unwrap_or(0.0)
}

/// `ok`, `low` or `empty`
#[wasm_bindgen]
pub fn stock_status(current: i32, threshold: u32) -> String {
    shared::stock_status(i64::from(current), threshold).as_str().to_string()
}
