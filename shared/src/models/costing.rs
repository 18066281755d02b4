//! Manufacturing costing models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::costing::calculate_costing;

/// Raw material purchased for one milling batch
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawMaterialBatch {
    /// Price per quintal
    #[serde(default)]
    pub buying_rate: Decimal,
    /// Quintals purchased
    #[serde(default)]
    pub quantity: Decimal,
    /// Processing expense for the whole batch
    #[serde(default)]
    pub expense: Decimal,
    /// Sunk cost of unsellable waste
    #[serde(default)]
    pub extra_cost: Decimal,
}

impl RawMaterialBatch {
    pub fn new(buying_rate: Decimal, quantity: Decimal, expense: Decimal, extra_cost: Decimal) -> Self {
        Self {
            buying_rate,
            quantity,
            expense,
            extra_cost,
        }
    }

    /// Purchase cost plus waste, the base apportioned as allocated cost
    pub fn material_cost(&self) -> Decimal {
        non_negative(self.buying_rate)
            .saturating_mul(non_negative(self.quantity))
            .saturating_add(non_negative(self.extra_cost))
    }

    /// `buying_rate × quantity + expense + extra_cost`
    pub fn total_cost(&self) -> Decimal {
        self.material_cost().saturating_add(non_negative(self.expense))
    }
}

/// An output product yielded by a batch
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Share of batch weight yielded, 0-100
    #[serde(default)]
    pub percentage: Decimal,
    /// Realized price per quintal for the sold portion
    #[serde(default)]
    pub selling_price: Decimal,
    /// Share of this product's weight already sold, 0-100
    #[serde(default)]
    pub sold_percentage: Decimal,
    /// Profit goal for this product; zero means unset
    #[serde(default)]
    pub target_profit: Decimal,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, percentage: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            percentage,
            ..Default::default()
        }
    }

    pub fn with_selling_price(mut self, selling_price: Decimal) -> Self {
        self.selling_price = selling_price;
        self
    }

    pub fn with_sold_percentage(mut self, sold_percentage: Decimal) -> Self {
        self.sold_percentage = sold_percentage;
        self
    }

    pub fn with_target_profit(mut self, target_profit: Decimal) -> Self {
        self.target_profit = target_profit;
        self
    }

    pub fn has_own_target(&self) -> bool {
        self.target_profit > Decimal::ZERO
    }
}

/// How batch cost and expense are apportioned across products
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CostAllocationMethod {
    /// Proportional to declared yield percentage
    #[default]
    Percentage,
    /// Proportional to `selling_price × weight`
    Value,
}

impl CostAllocationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostAllocationMethod::Percentage => "percentage",
            CostAllocationMethod::Value => "value",
        }
    }
}

impl std::fmt::Display for CostAllocationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostAllocationMethod::Percentage => write!(f, "By Percentage"),
            CostAllocationMethod::Value => write!(f, "By Value"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown cost allocation method: {0}")]
pub struct UnknownAllocationMethod(pub String);

impl std::str::FromStr for CostAllocationMethod {
    type Err = UnknownAllocationMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" => Ok(CostAllocationMethod::Percentage),
            "value" => Ok(CostAllocationMethod::Value),
            other => Err(UnknownAllocationMethod(other.to_string())),
        }
    }
}

/// Derived figures for one product, rebuilt on every recalculation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductCalculation {
    pub id: String,
    pub name: String,
    pub weight: Decimal,
    /// Fraction of batch cost and expense assigned to this product
    pub allocation_share: Decimal,
    pub allocated_cost: Decimal,
    pub allocated_expense: Decimal,
    pub cost_per_qtl: Decimal,
    pub total_investment_per_qtl: Decimal,
    /// Price per quintal at which cost and expense are exactly recovered
    pub break_even_price: Decimal,
    pub sold_weight: Decimal,
    pub remaining_weight: Decimal,
    pub sold_revenue: Decimal,
    pub sold_investment: Decimal,
    /// Negative when the sold portion went below cost
    pub sold_profit: Decimal,
    pub remaining_cost: Decimal,
    pub remaining_expense: Decimal,
    pub effective_target_profit: Decimal,
    pub remaining_profit: Decimal,
    pub profit: Decimal,
    pub next_selling_point_with_profit: Decimal,
}

/// Batch-level totals of a recalculation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostingSummary {
    pub material_cost: Decimal,
    pub total_cost: Decimal,
    pub total_percentage: Decimal,
    pub total_weight: Decimal,
    pub total_sold_profit: Decimal,
    pub total_target_profit: Decimal,
    pub total_remaining_profit_needed: Decimal,
    pub total_profit: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_warning: Option<String>,
}

/// Output of the costing engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostingResult {
    pub products: Vec<ProductCalculation>,
    pub summary: CostingSummary,
}

impl CostingResult {
    pub fn product(&self, id: &str) -> Option<&ProductCalculation> {
        self.products.iter().find(|p| p.id == id)
    }
}

/// A full snapshot of costing inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostingInput {
    #[serde(flatten)]
    pub batch: RawMaterialBatch,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub cost_allocation_method: CostAllocationMethod,
    #[serde(default)]
    pub overall_target_profit: Decimal,
}

impl CostingInput {
    pub fn builder() -> CostingBatchBuilder {
        CostingBatchBuilder::default()
    }

    pub fn calculate(&self) -> CostingResult {
        calculate_costing(
            &self.batch,
            &self.products,
            self.cost_allocation_method,
            self.overall_target_profit,
        )
    }
}

/// Builder for the batch and products aggregate
#[derive(Debug, Clone, Default)]
pub struct CostingBatchBuilder {
    input: CostingInput,
}

impl CostingBatchBuilder {
    pub fn buying_rate(mut self, buying_rate: Decimal) -> Self {
        self.input.batch.buying_rate = buying_rate;
        self
    }

    pub fn quantity(mut self, quantity: Decimal) -> Self {
        self.input.batch.quantity = quantity;
        self
    }

    pub fn expense(mut self, expense: Decimal) -> Self {
        self.input.batch.expense = expense;
        self
    }

    pub fn extra_cost(mut self, extra_cost: Decimal) -> Self {
        self.input.batch.extra_cost = extra_cost;
        self
    }

    pub fn batch(mut self, batch: RawMaterialBatch) -> Self {
        self.input.batch = batch;
        self
    }

    pub fn product(mut self, product: Product) -> Self {
        self.input.products.push(product);
        self
    }

    pub fn products(mut self, products: impl IntoIterator<Item = Product>) -> Self {
        self.input.products.extend(products);
        self
    }

    pub fn method(mut self, method: CostAllocationMethod) -> Self {
        self.input.cost_allocation_method = method;
        self
    }

    pub fn overall_target_profit(mut self, target: Decimal) -> Self {
        self.input.overall_target_profit = target;
        self
    }

    pub fn build(self) -> CostingInput {
        self.input
    }
}

pub(crate) fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// Sum that stops at `Decimal::MAX` / `Decimal::MIN` instead of overflowing
pub(crate) fn saturating_sum(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values
        .into_iter()
        .fold(Decimal::ZERO, Decimal::saturating_add)
}
