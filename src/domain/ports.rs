use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::{CacheError, DomainError};
use super::order::{
    CustomerContact, ExportRecord, ListResult, NewReconciliation, OrderFilter, OrderView,
    RefundUpdate, SalesSummary, StatusCount,
};
use super::status::OrderStatus;

pub trait OrderRepository: Send + Sync + 'static {
    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;

    /// Fetch every order in `ids`. Orders that do not exist are simply
    /// absent from the result; callers decide whether that is an error.
    fn find_many(&self, ids: &[Uuid]) -> Result<Vec<OrderView>, DomainError>;

    fn list(&self, filter: &OrderFilter, page: i64, limit: i64) -> Result<ListResult, DomainError>;

    /// Compare-and-swap status update. Fails with `Conflict` when the stored
    /// version no longer matches `expected_version`.
    fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        expected_version: i64,
    ) -> Result<OrderView, DomainError>;

    /// Move every order in `ids` to `status` inside one transaction. Either
    /// all rows change or none do.
    fn update_status_bulk(
        &self,
        ids: &[Uuid],
        status: OrderStatus,
    ) -> Result<Vec<OrderView>, DomainError>;

    fn update_fulfillment(
        &self,
        id: Uuid,
        tracking_number: &str,
        shipping_carrier: &str,
        estimated_delivery: Option<DateTime<Utc>>,
        expected_version: i64,
    ) -> Result<OrderView, DomainError>;

    fn apply_refund(
        &self,
        id: Uuid,
        update: &RefundUpdate,
        expected_version: i64,
    ) -> Result<OrderView, DomainError>;

    fn record_reconciliation(&self, rec: &NewReconciliation) -> Result<Uuid, DomainError>;

    fn mark_reconciliation_applied(&self, id: Uuid) -> Result<(), DomainError>;

    /// One page of export records matching `filter`, ordered by order number
    /// ascending, strictly after the cursor `after` when given.
    fn export_page(
        &self,
        filter: &OrderFilter,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ExportRecord>, DomainError>;

    fn sales_summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<SalesSummary, DomainError>;

    fn status_breakdown(&self) -> Result<Vec<StatusCount>, DomainError>;

    fn customer_contact(&self, customer_id: Uuid) -> Result<Option<CustomerContact>, DomainError>;
}

/// A refund as confirmed by the payment processor.
#[derive(Debug, Clone)]
pub struct ProcessorRefund {
    pub id: String,
    pub status: String,
}

pub trait PaymentGateway: Send + Sync + 'static {
    /// Ask the processor to return `amount_cents` against
    /// `payment_reference`. Implementations must bound the request with a
    /// timeout and map any non-success outcome to `PaymentFailed`.
    fn refund(
        &self,
        payment_reference: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<ProcessorRefund, DomainError>;
}

/// Key-value cache store. Every operation may fail independently; failures
/// must never be fatal to the caller.
pub trait CacheStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    /// One page of keys matching `pattern`. Returns the next cursor; a
    /// cursor of `0` means the scan is complete.
    fn scan(&self, cursor: u64, pattern: &str, count: usize)
        -> Result<(u64, Vec<String>), CacheError>;

    fn del(&self, keys: &[String]) -> Result<(), CacheError>;
}

/// Outbound message collaborator. Subjects and bodies arrive fully rendered.
pub trait Notifier: Send + Sync + 'static {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DomainError>;
}
