//! Costing record service
//!
//! Stores one raw-material batch with its products per record. Products live
//! in a JSONB column; derived figures are never stored and are recalculated
//! on every read.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::models::{
    validate_costing_input, CostAllocationMethod, CostingInput, CostingResult, PaginatedResponse,
    Pagination, PaginationMeta, Product, RawMaterialBatch, TargetSnapshot, TargetTracker,
};
use crate::services::autosave::DraftStore;

/// Costing service for managing manufacturing costing records
#[derive(Clone)]
pub struct CostingService {
    db: PgPool,
}

/// Database row for a costing record
#[derive(Debug, sqlx::FromRow)]
struct CostingRow {
    id: Uuid,
    name: String,
    buying_rate: Decimal,
    quantity: Decimal,
    expense: Decimal,
    extra_cost: Decimal,
    products: serde_json::Value,
    cost_allocation_method: String,
    overall_target_profit: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CostingRow> for CostingRecord {
    type Error = AppError;

    fn try_from(row: CostingRow) -> Result<Self, Self::Error> {
        let products: Vec<Product> = serde_json::from_value(row.products)
            .map_err(|e| AppError::CorruptRecord(format!("costing {} products: {}", row.id, e)))?;
        let cost_allocation_method = row
            .cost_allocation_method
            .parse::<CostAllocationMethod>()
            .map_err(|e| AppError::CorruptRecord(format!("costing {}: {}", row.id, e)))?;

        Ok(CostingRecord {
            id: row.id,
            name: row.name,
            input: CostingInput {
                batch: RawMaterialBatch {
                    buying_rate: row.buying_rate,
                    quantity: row.quantity,
                    expense: row.expense,
                    extra_cost: row.extra_cost,
                },
                products,
                cost_allocation_method,
                overall_target_profit: row.overall_target_profit,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A stored costing record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostingRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub input: CostingInput,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CostingRecord {
    /// The record as the user currently sees it, with unsaved edits applied
    pub fn with_draft(mut self, draft: UpsertCostingInput) -> Self {
        self.name = draft.name;
        self.input = draft.input;
        self
    }
}

/// A costing record with its recalculated figures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostingView {
    #[serde(flatten)]
    pub record: CostingRecord,
    pub calculation: CostingResult,
    /// A staged draft is waiting for autosave
    pub has_pending_changes: bool,
}

impl CostingView {
    pub fn new(record: CostingRecord, has_pending_changes: bool) -> Self {
        let calculation = record.input.calculate();
        Self {
            record,
            calculation,
            has_pending_changes,
        }
    }
}

/// Input for creating, replacing or drafting a costing record
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCostingInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    #[serde(flatten)]
    #[validate(custom = "validate_costing_fields")]
    pub input: CostingInput,
}

fn validate_costing_fields(input: &CostingInput) -> Result<(), ValidationError> {
    validate_costing_input(input).map_err(|message| {
        let mut error = ValidationError::new("costing");
        error.message = Some(Cow::Borrowed(message));
        error
    })
}

fn snapshot_of(input: &CostingInput) -> TargetSnapshot {
    TargetSnapshot {
        overall_target_profit: input.overall_target_profit,
        quantity: input.batch.quantity,
    }
}

/// Re-derive per-product targets when the overall target or quantity moved
/// away from `previous`. Returns true when targets were rewritten.
pub fn apply_target_changes(previous: &CostingInput, next: &mut CostingInput) -> bool {
    let mut tracker = TargetTracker::with_snapshot(snapshot_of(previous));
    let overall = next.overall_target_profit;
    let quantity = next.batch.quantity;
    tracker.sync(&mut next.products, overall, quantity)
}

const SELECT_COLUMNS: &str = r#"
    id, name, buying_rate, quantity, expense, extra_cost, products,
    cost_allocation_method, overall_target_profit, created_at, updated_at
"#;

impl CostingService {
    /// Create a new CostingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a costing record
    pub async fn create(&self, input: UpsertCostingInput) -> AppResult<CostingRecord> {
        let products = products_json(&input.input.products)?;
        let id = Uuid::new_v4();

        let row = sqlx::query_as::<_, CostingRow>(&format!(
            r#"
            INSERT INTO costing_records (id, name, buying_rate, quantity, expense, extra_cost,
                                         products, cost_allocation_method, overall_target_profit)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(input.input.batch.buying_rate)
        .bind(input.input.batch.quantity)
        .bind(input.input.batch.expense)
        .bind(input.input.batch.extra_cost)
        .bind(&products)
        .bind(input.input.cost_allocation_method.as_str())
        .bind(input.input.overall_target_profit)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(costing_id = %id, "Costing record created");
        row.try_into()
    }

    /// Get a costing record by ID
    pub async fn get(&self, costing_id: Uuid) -> AppResult<CostingRecord> {
        let row = sqlx::query_as::<_, CostingRow>(&format!(
            "SELECT {} FROM costing_records WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(costing_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Costing record".to_string()))?;

        row.try_into()
    }

    /// List costing records, most recently edited first
    pub async fn list(&self, pagination: &Pagination) -> AppResult<PaginatedResponse<CostingRecord>> {
        let page = pagination.normalized();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM costing_records")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, CostingRow>(&format!(
            "SELECT {} FROM costing_records ORDER BY updated_at DESC LIMIT $1 OFFSET $2",
            SELECT_COLUMNS
        ))
        .bind(i64::from(page.per_page))
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(CostingRecord::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&page, u64::try_from(total).unwrap_or(0)),
        })
    }

    /// Replace all inputs of a costing record
    pub async fn update(&self, costing_id: Uuid, input: &UpsertCostingInput) -> AppResult<CostingRecord> {
        let products = products_json(&input.input.products)?;

        let row = sqlx::query_as::<_, CostingRow>(&format!(
            r#"
            UPDATE costing_records
            SET name = $1, buying_rate = $2, quantity = $3, expense = $4, extra_cost = $5,
                products = $6, cost_allocation_method = $7, overall_target_profit = $8,
                updated_at = NOW()
            WHERE id = $9
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(input.input.batch.buying_rate)
        .bind(input.input.batch.quantity)
        .bind(input.input.batch.expense)
        .bind(input.input.batch.extra_cost)
        .bind(&products)
        .bind(input.input.cost_allocation_method.as_str())
        .bind(input.input.overall_target_profit)
        .bind(costing_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Costing record".to_string()))?;

        tracing::debug!(costing_id = %costing_id, "Costing record updated");
        row.try_into()
    }

    /// Delete a costing record
    pub async fn delete(&self, costing_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM costing_records WHERE id = $1")
            .bind(costing_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Costing record".to_string()));
        }

        tracing::info!(costing_id = %costing_id, "Costing record deleted");
        Ok(())
    }
}

#[axum::async_trait]
impl DraftStore for CostingService {
    async fn persist_draft(&self, costing_id: Uuid, draft: &UpsertCostingInput) -> AppResult<()> {
        self.update(costing_id, draft).await.map(|_| ())
    }
}

fn products_json(products: &[Product]) -> AppResult<serde_json::Value> {
    serde_json::to_value(products).map_err(|e| AppError::Internal(e.to_string()))
}
