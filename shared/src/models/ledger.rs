//! Supplier ledger models and entry arithmetic

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::costing::non_negative;

/// Weighbridge figures and charges for one supplier purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierEntryInput {
    /// Quintals on the scale including bags
    pub gross_weight: Decimal,
    /// Bag/vehicle tare in quintals
    #[serde(default)]
    pub teir_weight: Decimal,
    /// Moisture/impurity allowance as a percentage of net weight
    #[serde(default)]
    pub karta_percentage: Decimal,
    /// Price per quintal
    pub rate: Decimal,
    /// Labour charge per quintal of net weight
    #[serde(default)]
    pub laboury_rate: Decimal,
    /// Flat weighing-scale fee
    #[serde(default)]
    pub kanta: Decimal,
    /// Cash discount percentage applied on settlement
    #[serde(default)]
    pub cd_percentage: Decimal,
    pub entry_date: NaiveDate,
    /// Credit period in days
    #[serde(default)]
    pub term_days: u32,
}

/// Derived amounts of a supplier entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupplierEntryCalculation {
    pub net_weight: Decimal,
    pub karta_weight: Decimal,
    pub final_weight: Decimal,
    pub amount: Decimal,
    pub karta_amount: Decimal,
    pub laboury_amount: Decimal,
    pub kanta: Decimal,
    pub net_amount: Decimal,
    pub cd_amount: Decimal,
    pub payable_amount: Decimal,
    pub due_date: NaiveDate,
}

/// Apply karta, laboury, kanta and cash discount to a purchase
pub fn calculate_supplier_entry(input: &SupplierEntryInput) -> SupplierEntryCalculation {
    let net_weight = non_negative(input.gross_weight.saturating_sub(non_negative(input.teir_weight)));
    let karta_percentage = input
        .karta_percentage
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let karta_weight = net_weight.saturating_mul(karta_percentage) / Decimal::ONE_HUNDRED;
    let final_weight = net_weight.saturating_sub(karta_weight);

    let rate = non_negative(input.rate);
    let amount = final_weight.saturating_mul(rate);
    let karta_amount = karta_weight.saturating_mul(rate);
    let laboury_amount = net_weight.saturating_mul(non_negative(input.laboury_rate));
    let kanta = non_negative(input.kanta);
    let net_amount = amount.saturating_sub(laboury_amount).saturating_sub(kanta);
    let cd_amount = calculate_cash_discount(net_amount, input.cd_percentage);

    SupplierEntryCalculation {
        net_weight,
        karta_weight,
        final_weight,
        amount,
        karta_amount,
        laboury_amount,
        kanta,
        net_amount,
        cd_amount,
        payable_amount: net_amount.saturating_sub(cd_amount),
        due_date: calculate_due_date(input.entry_date, input.term_days),
    }
}

/// Cash discount on a settled amount; nothing is discounted from a negative amount
pub fn calculate_cash_discount(amount: Decimal, cd_percentage: Decimal) -> Decimal {
    let percentage = cd_percentage.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    non_negative(amount).saturating_mul(percentage) / Decimal::ONE_HUNDRED
}

/// Entry date plus the credit period
pub fn calculate_due_date(entry_date: NaiveDate, term_days: u32) -> NaiveDate {
    entry_date
        .checked_add_days(Days::new(u64::from(term_days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Outstanding balance past its due date
pub fn is_overdue(due_date: NaiveDate, today: NaiveDate, outstanding: Decimal) -> bool {
    outstanding > Decimal::ZERO && today > due_date
}

/// One line in a supplier or customer ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    /// Payments made
    #[serde(default)]
    pub debit: Decimal,
    /// Purchases owed
    #[serde(default)]
    pub credit: Decimal,
}

/// A ledger entry with the balance after it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerLine {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub balance: Decimal,
}

/// Running balance in date order. Entries on the same date keep their input order.
pub fn running_balance(entries: &[LedgerEntry]) -> Vec<LedgerLine> {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.date);

    let mut balance = Decimal::ZERO;
    ordered
        .into_iter()
        .map(|entry| {
            balance = balance.saturating_add(entry.credit.saturating_sub(entry.debit));
            LedgerLine {
                entry: entry.clone(),
                balance,
            }
        })
        .collect()
}
