use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::OrderStatus;

/// One line of an order. The unit price is a snapshot taken at purchase
/// time and never changes afterwards, even if the product's live price does.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

/// An order as the application layer sees it. All monetary fields are
/// integer minor currency units (cents).
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub refund_amount_cents: Option<i64>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub shipping_carrier: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Opaque reference to the payment-processor transaction. Required
    /// before any refund is permitted.
    pub payment_reference: Option<String>,
    /// Monotonic version for compare-and-swap updates.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<OrderLineView>,
}

impl OrderView {
    /// Cents already returned to the customer.
    pub fn refunded_cents(&self) -> i64 {
        self.refund_amount_cents.unwrap_or(0)
    }

    /// Cents still available to refund.
    pub fn remaining_refundable_cents(&self) -> i64 {
        self.total_cents - self.refunded_cents()
    }
}

/// Name and email of the customer owning an order, for outbound messages.
#[derive(Debug, Clone)]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
}

/// Predicate over orders, shared by listing and export.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Free-text match over order number, customer name and customer email.
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<OrderView>,
    pub total: i64,
}

/// One flattened row of the export feed: an order joined to its customer.
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub refund_amount_cents: Option<i64>,
    pub tracking_number: Option<String>,
    pub shipping_carrier: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Field changes applied to an order when a refund commits locally.
/// `refund_amount_cents` is the new cumulative total, not the delta.
#[derive(Debug, Clone)]
pub struct RefundUpdate {
    pub refund_amount_cents: i64,
    pub reason: String,
    pub refunded_at: DateTime<Utc>,
    /// Set when the refund reaches the order total and the order
    /// auto-transitions to `Cancelled`.
    pub new_status: Option<OrderStatus>,
}

/// Durable record that the processor confirmed a refund, written before the
/// local order update so an orphaned refund can be found and repaired.
#[derive(Debug, Clone)]
pub struct NewReconciliation {
    pub order_id: Uuid,
    pub processor_refund_id: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub order_count: i64,
    pub gross_cents: i64,
    pub refunded_cents: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Render integer minor units as a two-decimal string, e.g. `1234` -> `12.34`.
pub fn format_minor_units(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
