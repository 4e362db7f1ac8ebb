use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use backroom_catalog::ProductId;
use backroom_core::{DomainError, DomainResult, Money, UserId};

/// Ledger entry identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(Uuid);

impl MovementId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MovementId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Cause of an inventory quantity change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Return,
    Transfer,
    Damage,
    Expired,
}

/// One immutable inventory quantity change with its before/after snapshot.
///
/// Construction is the only mutation point: [`StockMovement::new`] enforces
/// `new_stock = previous_stock + quantity` (both snapshots non-negative by
/// type), after which the record is a fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    /// Signed quantity delta (positive for receipts, negative for depletion).
    pub quantity: i64,
    pub previous_stock: u32,
    pub new_stock: u32,
    pub unit_cost: Money,
    /// `quantity × unit_cost`, signed like the quantity.
    pub total_value: Money,
    /// Free text, typically a purchase-order or sale number.
    pub reference: String,
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        product_id: ProductId,
        movement_type: MovementType,
        quantity: i64,
        previous_stock: u32,
        new_stock: u32,
        unit_cost: Money,
        reference: impl Into<String>,
        notes: Option<String>,
        recorded_by: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation(
                "stock movement quantity must not be zero",
            ));
        }
        let expected = i64::from(previous_stock)
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("stock movement quantity overflowed"))?;
        if expected != i64::from(new_stock) {
            return Err(DomainError::invariant(format!(
                "stock snapshot mismatch: {previous_stock} + {quantity} != {new_stock}"
            )));
        }
        if unit_cost.is_negative() {
            return Err(DomainError::validation("unit cost must not be negative"));
        }
        let total_value = unit_cost
            .checked_mul_qty(quantity)
            .ok_or_else(|| DomainError::validation("stock movement value overflowed"))?;

        Ok(Self {
            id: MovementId::new(),
            product_id,
            movement_type,
            quantity,
            previous_stock,
            new_stock,
            unit_cost,
            total_value,
            reference: reference.into(),
            notes,
            recorded_by,
            occurred_at,
        })
    }
}
