use chrono::{DateTime, Utc};
use serde::Deserialize;

use backroom_core::Totals;
use backroom_infra::projections::{OrderReadModel, PurchaseOrderReadModel};
use backroom_inventory::StockMovement;
use backroom_sales::Sale;

// -------------------------
// Request DTOs
// -------------------------

/// Money amounts arrive as integer minor units (e.g. cents).
#[derive(Debug, Deserialize)]
pub struct PurchaseOrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_cost: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: String,
    pub items: Vec<PurchaseOrderItemRequest>,
    #[serde(default)]
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub tax: i64,
    #[serde(default)]
    pub shipping: i64,
    #[serde(default)]
    pub discount: i64,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveLineRequest {
    pub product_id: String,
    pub quantity: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveDeliveryRequest {
    pub lines: Vec<ReceiveLineRequest>,
    pub notes: Option<String>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingAddressRequest {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub method: String,
    pub reference: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer: CustomerRequest,
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub tax: i64,
    #[serde(default)]
    pub shipping: i64,
    #[serde(default)]
    pub discount: i64,
    pub shipping_address: Option<ShippingAddressRequest>,
    pub payment: PaymentRequest,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

fn totals_to_json(totals: &Totals) -> serde_json::Value {
    serde_json::json!({
        "subtotal": totals.subtotal.minor(),
        "tax": totals.tax.minor(),
        "shipping": totals.shipping.minor(),
        "discount": totals.discount.minor(),
        "total": totals.total().ok().map(|total| total.minor()),
    })
}

pub fn purchase_order_to_json(rm: PurchaseOrderReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.order_id.0.to_string(),
        "order_number": rm.order_number,
        "supplier_id": rm.supplier_id.to_string(),
        "status": rm.status.as_str(),
        "items": rm.items.iter().map(|item| serde_json::json!({
            "product_id": item.product_id.to_string(),
            "ordered_quantity": item.ordered_quantity,
            "received_quantity": item.received_quantity,
            "unit_cost": item.unit_cost.minor(),
            "notes": item.notes,
        })).collect::<Vec<_>>(),
        "totals": totals_to_json(&rm.totals),
        "currency": rm.currency,
        "payment_terms": rm.payment_terms,
        "notes": rm.notes,
        "ordered_date": rm.ordered_date,
        "expected_delivery": rm.expected_delivery,
        "actual_delivery": rm.actual_delivery,
        "received_by": rm.received_by.map(|u| u.to_string()),
        "receiving_notes": rm.receiving_notes,
    })
}

pub fn order_to_json(rm: OrderReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.order_id.0.to_string(),
        "order_number": rm.order_number,
        "customer_name": rm.customer_name,
        "status": rm.status.as_str(),
        "items": rm.items.iter().map(|item| serde_json::json!({
            "product_id": item.product_id.to_string(),
            "quantity": item.quantity,
            "unit_price": item.unit_price.minor(),
        })).collect::<Vec<_>>(),
        "totals": totals_to_json(&rm.totals),
        "status_history": rm.status_history.iter().map(|entry| serde_json::json!({
            "status": entry.status.as_str(),
            "at": entry.at,
            "notes": entry.notes,
            "actor": entry.actor.to_string(),
        })).collect::<Vec<_>>(),
        "tracking_number": rm.tracking_number,
        "estimated_delivery": rm.estimated_delivery,
        "assigned_to": rm.assigned_to.map(|u| u.to_string()),
        "packed_by": rm.packed_by.map(|u| u.to_string()),
        "shipped_by": rm.shipped_by.map(|u| u.to_string()),
        "confirmed_at": rm.confirmed_at,
        "packed_at": rm.packed_at,
        "shipped_at": rm.shipped_at,
        "delivered_at": rm.delivered_at,
        "actual_delivery": rm.actual_delivery,
        "created_at": rm.created_at,
    })
}

pub fn movement_to_json(m: &StockMovement) -> serde_json::Value {
    serde_json::json!({
        "id": m.id.to_string(),
        "product_id": m.product_id.to_string(),
        "movement_type": m.movement_type,
        "quantity": m.quantity,
        "previous_stock": m.previous_stock,
        "new_stock": m.new_stock,
        "unit_cost": m.unit_cost.minor(),
        "total_value": m.total_value.minor(),
        "reference": m.reference,
        "notes": m.notes,
        "recorded_by": m.recorded_by.to_string(),
        "occurred_at": m.occurred_at,
    })
}

pub fn sale_to_json(sale: &Sale) -> serde_json::Value {
    serde_json::json!({
        "sale_number": sale.sale_number,
        "order_number": sale.order_number,
        "customer_name": sale.customer_name,
        "items": sale.items.iter().map(|item| serde_json::json!({
            "product_id": item.product_id.to_string(),
            "quantity": item.quantity,
            "unit_price": item.unit_price.minor(),
            "line_total": item.line_total.minor(),
        })).collect::<Vec<_>>(),
        "totals": totals_to_json(&sale.totals),
        "payment": serde_json::json!({
            "method": sale.payment.method,
            "reference": sale.payment.reference,
            "amount": sale.payment.amount.minor(),
            "status": sale.payment.status,
        }),
        "status": sale.status,
        "sale_date": sale.sale_date,
        "recorded_by": sale.recorded_by.to_string(),
        "created_at": sale.created_at,
    })
}
