//! WebAssembly module for the Mill Costing Platform
//!
//! Provides client-side computation for:
//! - Manufacturing cost allocation and next selling price
//! - Supplier entry deductions (karta, laboury, kanta, cash discount)
//! - Product percentage warnings

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Recalculate a costing record given as JSON, returning the result as JSON
#[wasm_bindgen]
pub fn calculate_costing(input_json: &str) -> Result<String, JsValue> {
    let output = costing_json(input_json).map_err(|e| JsValue::from(js_sys::Error::new(&e)))?;
    Ok(output)
}

/// Calculate a supplier entry given as JSON, returning the result as JSON
#[wasm_bindgen]
pub fn calculate_supplier_entry(input_json: &str) -> Result<String, JsValue> {
    let output =
        supplier_entry_json(input_json).map_err(|e| JsValue::from(js_sys::Error::new(&e)))?;
    Ok(output)
}

/// Warning text when yield percentages do not sum to 100
#[wasm_bindgen]
pub fn check_percentage_total(percentages: &[f64]) -> Option<String> {
    let products: Vec<Product> = percentages
        .iter()
        .enumerate()
        .map(|(i, &pct)| Product::new(i.to_string(), String::new(), to_decimal(pct)))
        .collect();
    shared::validation::check_percentage_total(&products)
}

/// Total batch cost per purchased quintal
#[wasm_bindgen]
pub fn calculate_cost_per_qtl(buying_rate: f64, quantity: f64, expense: f64, extra_cost: f64) -> f64 {
    let batch = RawMaterialBatch::new(
        to_decimal(buying_rate),
        to_decimal(quantity),
        to_decimal(expense),
        to_decimal(extra_cost),
    );
    let per_qtl = shared::costing::safe_div(batch.total_cost(), batch.quantity);
    per_qtl.to_f64().unwrap_or(0.0)
}

/// Format an amount as rupees for display
#[wasm_bindgen]
pub fn format_currency(amount: f64) -> String {
    shared::types::format_currency(to_decimal(amount))
}

fn costing_json(input_json: &str) -> Result<String, String> {
    let input: CostingInput =
        serde_json::from_str(input_json).map_err(|e| format!("Invalid costing JSON: {}", e))?;

    let result = input.calculate();
    if let Some(warning) = &result.summary.percentage_warning {
        warn(warning);
    }

    serde_json::to_string(&result).map_err(|e| format!("Failed to encode result: {}", e))
}

fn supplier_entry_json(input_json: &str) -> Result<String, String> {
    let input: SupplierEntryInput = serde_json::from_str(input_json)
        .map_err(|e| format!("Invalid supplier entry JSON: {}", e))?;
    validate_supplier_entry(&input).map_err(|e| e.to_string())?;

    let calculation = shared::models::calculate_supplier_entry(&input);
    serde_json::to_string(&calculation).map_err(|e| format!("Failed to encode result: {}", e))
}

fn to_decimal(value: f64) -> Decimal {
    if value.is_finite() {
        Decimal::try_from(value).unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

fn warn(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&JsValue::from_str(message));
    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}
