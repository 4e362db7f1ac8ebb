use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backroom_catalog::ProductId;
use backroom_core::{docnum, DomainError, DomainResult, Money, Totals, UserId};
use backroom_orders::{Order, OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Refunded,
}

/// Snapshot of one order line at delivery time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Synthetic payment record derived from the order's payment info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalePayment {
    pub method: String,
    pub reference: Option<String>,
    pub amount: Money,
    pub status: PaymentStatus,
}

/// Materialized completed transaction.
///
/// Keyed by the source order's number (one sale per order, enforced by the
/// store's conditional insert). Immutable after creation; refund workflows
/// run independently and are out of scope here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub sale_number: String,
    pub order_number: String,
    pub customer_name: String,
    pub items: Vec<SaleItem>,
    pub totals: Totals,
    pub payment: SalePayment,
    pub status: SaleStatus,
    /// `actual_delivery` of the source order, falling back to conversion time.
    pub sale_date: DateTime<Utc>,
    pub recorded_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Build a sale snapshot from a delivered order.
    ///
    /// Pure construction; the duplicate-conversion guard lives in the store
    /// (`insert_if_absent` keyed by order number).
    pub fn from_order(order: &Order, actor: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        if order.status() != OrderStatus::Delivered {
            return Err(DomainError::invariant(format!(
                "only delivered orders convert to sales, order {} is {}",
                order.order_number(),
                order.status().as_str()
            )));
        }

        let items = order
            .items()
            .iter()
            .map(|item| SaleItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
            })
            .collect();

        let payment = match order.payment() {
            Some(p) => SalePayment {
                method: p.method.clone(),
                reference: p.reference.clone(),
                amount: p.amount,
                status: PaymentStatus::Completed,
            },
            None => SalePayment {
                method: "unknown".to_string(),
                reference: None,
                amount: order.totals().total()?,
                status: PaymentStatus::Completed,
            },
        };

        Ok(Self {
            sale_number: docnum::sale_number_for(order.order_number()),
            order_number: order.order_number().to_string(),
            customer_name: order
                .customer()
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            items,
            totals: order.totals(),
            payment,
            status: SaleStatus::Completed,
            sale_date: order.actual_delivery().unwrap_or(now),
            recorded_by: actor,
            created_at: now,
        })
    }

    pub fn total_amount(&self) -> DomainResult<Money> {
        self.totals.total()
    }
}
