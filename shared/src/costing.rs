//! Cost allocation and target-profit distribution
//!
//! Every recalculation runs two passes over the products of a batch:
//!
//! 1. Each product is costed on its own: weight, allocated cost and expense,
//!    the sold/remaining split, realized profit on the sold part and a
//!    provisional target profit.
//! 2. Realized profit is summed across the batch and the amount still needed
//!    to reach the batch target is spread over products that have stock left,
//!    which yields the suggested next selling price for that stock.
//!
//! Nothing here fails. A zero divisor produces zero, negative inputs are
//! treated as zero, and results too large for a `Decimal` saturate at
//! `Decimal::MAX`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    non_negative, saturating_sum, CostAllocationMethod, CostingResult, CostingSummary, Product,
    ProductCalculation, RawMaterialBatch,
};
use crate::validation::check_percentage_total;

/// Run both passes over a batch and its products
pub fn calculate_costing(
    batch: &RawMaterialBatch,
    products: &[Product],
    method: CostAllocationMethod,
    overall_target_profit: Decimal,
) -> CostingResult {
    let quantity = non_negative(batch.quantity);
    let material_cost = batch.material_cost();
    let expense = non_negative(batch.expense);
    let overall_target = non_negative(overall_target_profit);

    let weights: Vec<Decimal> = products
        .iter()
        .map(|p| product_weight(quantity, p))
        .collect();
    let shares = allocation_shares(products, &weights, method);
    let pool_weight = remaining_pool_weight(products, &weights);

    // Pass 1
    let mut calculations: Vec<ProductCalculation> = products
        .iter()
        .zip(weights.iter().zip(shares.iter()))
        .map(|(product, (&weight, &share))| {
            let allocated_cost = material_cost.saturating_mul(share);
            let allocated_expense = expense.saturating_mul(share);
            let allocated_total = allocated_cost.saturating_add(allocated_expense);
            let cost_per_qtl = safe_div(allocated_cost, weight);
            let expense_per_qtl = safe_div(allocated_expense, weight);
            let total_investment_per_qtl = safe_div(allocated_total, weight);

            let sold_weight = weight.saturating_mul(sold_fraction(product));
            let remaining_weight = weight.saturating_sub(sold_weight);

            let sold_revenue = non_negative(product.selling_price).saturating_mul(sold_weight);
            let sold_investment = total_investment_per_qtl.saturating_mul(sold_weight);
            let sold_profit = sold_revenue.saturating_sub(sold_investment);

            let effective_target_profit = effective_target(
                product,
                weight,
                remaining_weight,
                overall_target,
                pool_weight,
            );

            ProductCalculation {
                id: product.id.clone(),
                name: product.name.clone(),
                weight,
                allocation_share: share,
                allocated_cost,
                allocated_expense,
                cost_per_qtl,
                total_investment_per_qtl,
                break_even_price: total_investment_per_qtl,
                sold_weight,
                remaining_weight,
                sold_revenue,
                sold_investment,
                sold_profit,
                remaining_cost: cost_per_qtl.saturating_mul(remaining_weight),
                remaining_expense: expense_per_qtl.saturating_mul(remaining_weight),
                effective_target_profit,
                remaining_profit: effective_target_profit,
                profit: sold_profit.saturating_add(effective_target_profit),
                next_selling_point_with_profit: safe_div(
                    allocated_total.saturating_add(effective_target_profit),
                    weight,
                ),
            }
        })
        .collect();

    // Pass 2
    let total_sold_profit = saturating_sum(calculations.iter().map(|c| c.sold_profit));
    let total_target_profit = if overall_target > Decimal::ZERO {
        overall_target
    } else {
        overall_from_products(products)
    };
    let total_remaining_profit_needed = total_target_profit.saturating_sub(total_sold_profit);

    let target_pool = saturating_sum(
        calculations
            .iter()
            .filter(|c| has_stock(c))
            .map(|c| c.effective_target_profit),
    );

    for calc in calculations.iter_mut() {
        if !has_stock(calc) {
            calc.remaining_profit = Decimal::ZERO;
            calc.profit = calc.sold_profit;
            continue;
        }

        let ratio = if target_pool > Decimal::ZERO {
            safe_div(calc.effective_target_profit, target_pool)
        } else {
            safe_div(calc.weight, pool_weight)
        };
        let remaining_profit = non_negative(total_remaining_profit_needed.saturating_mul(ratio));

        let sold_loss = non_negative(-calc.sold_profit);
        let remaining_investment = calc
            .remaining_cost
            .saturating_add(calc.remaining_expense)
            .saturating_add(sold_loss);

        calc.remaining_profit = remaining_profit;
        calc.profit = calc.sold_profit.saturating_add(remaining_profit);
        calc.next_selling_point_with_profit = safe_div(
            remaining_investment.saturating_add(remaining_profit),
            calc.remaining_weight,
        );
    }

    let summary = CostingSummary {
        material_cost,
        total_cost: batch.total_cost(),
        total_percentage: saturating_sum(products.iter().map(|p| p.percentage)),
        total_weight: saturating_sum(weights.iter().copied()),
        total_sold_profit,
        total_target_profit,
        total_remaining_profit_needed,
        total_profit: saturating_sum(calculations.iter().map(|c| c.profit)),
        percentage_warning: check_percentage_total(products),
    };

    CostingResult {
        products: calculations,
        summary,
    }
}

/// Fraction of batch cost and expense each product carries
pub fn allocation_shares(
    products: &[Product],
    weights: &[Decimal],
    method: CostAllocationMethod,
) -> Vec<Decimal> {
    match method {
        CostAllocationMethod::Percentage => products
            .iter()
            .map(|p| non_negative(p.percentage) / Decimal::ONE_HUNDRED)
            .collect(),
        CostAllocationMethod::Value => {
            let values: Vec<Decimal> = products
                .iter()
                .zip(weights)
                .map(|(p, &weight)| non_negative(p.selling_price).saturating_mul(weight))
                .collect();
            let total = saturating_sum(values.iter().copied());
            values.into_iter().map(|v| safe_div(v, total)).collect()
        }
    }
}

/// Quotient that is zero whenever the divisor is not positive
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(if numerator.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}

fn product_weight(quantity: Decimal, product: &Product) -> Decimal {
    quantity.saturating_mul(non_negative(product.percentage)) / Decimal::ONE_HUNDRED
}

fn sold_fraction(product: &Product) -> Decimal {
    product
        .sold_percentage
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
        / Decimal::ONE_HUNDRED
}

fn has_stock(calc: &ProductCalculation) -> bool {
    calc.remaining_weight > Decimal::ZERO
}

/// Initial weight of every product that still has unsold stock
fn remaining_pool_weight(products: &[Product], weights: &[Decimal]) -> Decimal {
    saturating_sum(
        products
            .iter()
            .zip(weights)
            .filter(|(p, &weight)| remaining_of(weight, p) > Decimal::ZERO)
            .map(|(_, &weight)| weight),
    )
}

fn remaining_of(weight: Decimal, product: &Product) -> Decimal {
    weight.saturating_sub(weight.saturating_mul(sold_fraction(product)))
}

/// A product's own target wins; otherwise it takes its initial-weight share of
/// the overall target. Initial weight keeps the share fixed while sales move.
fn effective_target(
    product: &Product,
    weight: Decimal,
    remaining_weight: Decimal,
    overall_target: Decimal,
    remaining_pool_weight: Decimal,
) -> Decimal {
    if product.has_own_target() {
        return product.target_profit;
    }
    if overall_target <= Decimal::ZERO || remaining_weight <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    overall_target.saturating_mul(safe_div(weight, remaining_pool_weight))
}

/// Overall target and quantity seen by the previous recalculation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetSnapshot {
    pub overall_target_profit: Decimal,
    pub quantity: Decimal,
}

/// Re-derives per-product targets only when the overall target or the batch
/// quantity changed since the last call.
#[derive(Debug, Clone, Default)]
pub struct TargetTracker {
    previous: Option<TargetSnapshot>,
}

impl TargetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume tracking from a record that was already loaded once
    pub fn with_snapshot(snapshot: TargetSnapshot) -> Self {
        Self {
            previous: Some(snapshot),
        }
    }

    pub fn snapshot(&self) -> Option<TargetSnapshot> {
        self.previous
    }

    /// Returns true when product targets were rewritten.
    ///
    /// The first call only records the snapshot so targets loaded with a
    /// record are kept as they are. An overall target of zero never clears
    /// per-product targets.
    pub fn sync(
        &mut self,
        products: &mut [Product],
        overall_target_profit: Decimal,
        quantity: Decimal,
    ) -> bool {
        let current = TargetSnapshot {
            overall_target_profit,
            quantity,
        };
        let changed = matches!(self.previous, Some(previous) if previous != current);
        self.previous = Some(current);

        if changed && overall_target_profit > Decimal::ZERO {
            distribute_overall_target(products, overall_target_profit, quantity);
            true
        } else {
            false
        }
    }
}

/// Write each product's share of the overall target into its own target.
/// Fully sold products get zero.
pub fn distribute_overall_target(
    products: &mut [Product],
    overall_target_profit: Decimal,
    quantity: Decimal,
) {
    let quantity = non_negative(quantity);
    let overall = non_negative(overall_target_profit);
    let weights: Vec<Decimal> = products
        .iter()
        .map(|p| product_weight(quantity, p))
        .collect();
    let pool = remaining_pool_weight(products, &weights);

    for (product, weight) in products.iter_mut().zip(weights) {
        product.target_profit = if remaining_of(weight, product) > Decimal::ZERO {
            overall.saturating_mul(safe_div(weight, pool))
        } else {
            Decimal::ZERO
        };
    }
}

/// The overall target implied by per-product targets
pub fn overall_from_products(products: &[Product]) -> Decimal {
    saturating_sum(products.iter().map(|p| non_negative(p.target_profit)))
}
