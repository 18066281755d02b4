//! Validation utilities for the Mill Costing Platform
//!
//! Costing input checks are advisory for the engine, which computes a result
//! for any input. The backend rejects records that fail them.

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::models::{saturating_sum, CostingInput, Product, RawMaterialBatch, SupplierEntryInput};

// ============================================================================
// Costing Validations
// ============================================================================

/// Largest rate, quantity or amount accepted on input (one trillion)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Warning text when product percentages do not add up to 100
pub fn check_percentage_total(products: &[Product]) -> Option<String> {
    if products.is_empty() {
        return None;
    }

    let total = saturating_sum(products.iter().map(|p| p.percentage));
    if total == Decimal::ONE_HUNDRED {
        None
    } else {
        Some(format!(
            "Product percentages add up to {}%, expected 100%",
            total.normalize()
        ))
    }
}

/// Validate a percentage is within 0-100
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate an amount, rate or weight is not negative
pub fn validate_non_negative(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Value cannot be negative");
    }
    Ok(())
}

/// Validate an amount is not above [`MAX_AMOUNT`]
pub fn validate_magnitude(value: Decimal) -> Result<(), &'static str> {
    if value.abs() > MAX_AMOUNT {
        return Err("Value is too large");
    }
    Ok(())
}

/// Validate batch purchase figures
pub fn validate_batch(batch: &RawMaterialBatch) -> Result<(), &'static str> {
    if batch.buying_rate < Decimal::ZERO {
        return Err("Buying rate cannot be negative");
    }
    if batch.quantity < Decimal::ZERO {
        return Err("Quantity cannot be negative");
    }
    if batch.expense < Decimal::ZERO {
        return Err("Expense cannot be negative");
    }
    if batch.extra_cost < Decimal::ZERO {
        return Err("Extra cost cannot be negative");
    }
    if validate_magnitude(batch.buying_rate).is_err()
        || validate_magnitude(batch.quantity).is_err()
        || validate_magnitude(batch.expense).is_err()
        || validate_magnitude(batch.extra_cost).is_err()
    {
        return Err("Batch figures cannot exceed one trillion");
    }
    Ok(())
}

/// Validate a single product's inputs
pub fn validate_product(product: &Product) -> Result<(), &'static str> {
    if product.id.trim().is_empty() {
        return Err("Product id is required");
    }
    if validate_percentage(product.percentage).is_err() {
        return Err("Product percentage must be between 0 and 100");
    }
    if validate_percentage(product.sold_percentage).is_err() {
        return Err("Sold percentage must be between 0 and 100");
    }
    if product.selling_price < Decimal::ZERO {
        return Err("Selling price cannot be negative");
    }
    if product.target_profit < Decimal::ZERO {
        return Err("Target profit cannot be negative");
    }
    if validate_magnitude(product.selling_price).is_err()
        || validate_magnitude(product.target_profit).is_err()
    {
        return Err("Product figures cannot exceed one trillion");
    }
    Ok(())
}

/// Validate a full costing snapshot. The percentage total is not checked here;
/// see [`check_percentage_total`].
pub fn validate_costing_input(input: &CostingInput) -> Result<(), &'static str> {
    validate_batch(&input.batch)?;

    if input.overall_target_profit < Decimal::ZERO {
        return Err("Overall target profit cannot be negative");
    }
    if validate_magnitude(input.overall_target_profit).is_err() {
        return Err("Overall target profit cannot exceed one trillion");
    }

    let mut seen = HashSet::new();
    for product in &input.products {
        validate_product(product)?;
        if !seen.insert(product.id.as_str()) {
            return Err("Product ids must be unique");
        }
    }
    Ok(())
}

// ============================================================================
// Ledger Validations
// ============================================================================

/// Validate weighbridge and charge figures of a supplier entry
pub fn validate_supplier_entry(input: &SupplierEntryInput) -> Result<(), &'static str> {
    if input.gross_weight <= Decimal::ZERO {
        return Err("Gross weight must be positive");
    }
    if input.teir_weight < Decimal::ZERO {
        return Err("Tare weight cannot be negative");
    }
    if input.teir_weight > input.gross_weight {
        return Err("Tare weight cannot exceed gross weight");
    }
    if validate_percentage(input.karta_percentage).is_err() {
        return Err("Karta percentage must be between 0 and 100");
    }
    if validate_percentage(input.cd_percentage).is_err() {
        return Err("Cash discount must be between 0 and 100");
    }
    if input.rate < Decimal::ZERO || input.laboury_rate < Decimal::ZERO || input.kanta < Decimal::ZERO
    {
        return Err("Rates and charges cannot be negative");
    }
    if [input.gross_weight, input.rate, input.laboury_rate, input.kanta]
        .into_iter()
        .any(|v| validate_magnitude(v).is_err())
    {
        return Err("Weights and rates cannot exceed one trillion");
    }
    Ok(())
}
