//! HTTP handlers for supplier ledger calculations

use axum::{response::IntoResponse, Json};

use crate::{
    error::{AppError, AppResult},
    models::{calculate_supplier_entry, validate_supplier_entry, SupplierEntryInput},
};

/// Calculate deductions, payable amount and due date of a supplier entry
pub async fn calculate_ledger_entry(
    Json(input): Json<SupplierEntryInput>,
) -> AppResult<impl IntoResponse> {
    validate_supplier_entry(&input).map_err(|e| AppError::ValidationError(e.to_string()))?;
    Ok(Json(calculate_supplier_entry(&input)))
}
