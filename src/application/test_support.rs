//! In-memory fakes behind the domain ports, shared by the service tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{CacheError, DomainError};
use crate::domain::order::{
    CustomerContact, ExportRecord, ListResult, NewReconciliation, OrderFilter, OrderView,
    RefundUpdate, SalesSummary, StatusCount,
};
use crate::domain::ports::{CacheStore, Notifier, OrderRepository};
use crate::domain::status::OrderStatus;

// ── Order repository ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub id: Uuid,
    pub order_id: Uuid,
    pub processor_refund_id: String,
    pub amount_cents: i64,
    pub applied: bool,
}

#[derive(Default)]
struct OrdersState {
    orders: HashMap<Uuid, OrderView>,
    contacts: HashMap<Uuid, CustomerContact>,
    reconciliations: Vec<Reconciliation>,
    export_fetches: usize,
    fail_apply_refund: bool,
    fail_record_reconciliation: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryOrders {
    inner: Arc<Mutex<OrdersState>>,
}

impl InMemoryOrders {
    pub fn insert(&self, order: OrderView) {
        self.inner.lock().unwrap().orders.insert(order.id, order);
    }

    pub fn insert_contact(&self, customer_id: Uuid, name: &str, email: &str) {
        self.inner.lock().unwrap().contacts.insert(
            customer_id,
            CustomerContact {
                name: name.to_string(),
                email: email.to_string(),
            },
        );
    }

    /// Test-side read; panics when the order is absent.
    pub fn get(&self, id: Uuid) -> OrderView {
        self.inner.lock().unwrap().orders[&id].clone()
    }

    pub fn export_fetches(&self) -> usize {
        self.inner.lock().unwrap().export_fetches
    }

    pub fn reconciliations(&self) -> Vec<Reconciliation> {
        self.inner.lock().unwrap().reconciliations.clone()
    }

    pub fn fail_apply_refund(&self) {
        self.inner.lock().unwrap().fail_apply_refund = true;
    }

    pub fn fail_record_reconciliation(&self) {
        self.inner.lock().unwrap().fail_record_reconciliation = true;
    }
}

fn matches_filter(order: &OrderView, contact: Option<&CustomerContact>, filter: &OrderFilter) -> bool {
    if let Some(status) = filter.status {
        if order.status != status {
            return false;
        }
    }
    if let Some(from) = filter.created_from {
        if order.created_at < from {
            return false;
        }
    }
    if let Some(to) = filter.created_to {
        if order.created_at >= to {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let mut haystack = order.order_number.to_lowercase();
        if let Some(c) = contact {
            haystack.push_str(&c.name.to_lowercase());
            haystack.push_str(&c.email.to_lowercase());
        }
        if !haystack.contains(&needle) {
            return false;
        }
    }
    true
}

impl OrderRepository for InMemoryOrders {
    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        Ok(self.inner.lock().unwrap().orders.get(&id).cloned())
    }

    fn find_many(&self, ids: &[Uuid]) -> Result<Vec<OrderView>, DomainError> {
        let state = self.inner.lock().unwrap();
        Ok(ids.iter().filter_map(|id| state.orders.get(id).cloned()).collect())
    }

    fn list(&self, filter: &OrderFilter, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let state = self.inner.lock().unwrap();
        let mut items: Vec<OrderView> = state
            .orders
            .values()
            .filter(|o| matches_filter(o, state.contacts.get(&o.customer_id), filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        let total = items.len() as i64;
        let offset = ((page - 1) * limit).max(0) as usize;
        let items = items.into_iter().skip(offset).take(limit as usize).collect();
        Ok(ListResult { items, total })
    }

    fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        expected_version: i64,
    ) -> Result<OrderView, DomainError> {
        let mut state = self.inner.lock().unwrap();
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;
        if order.version != expected_version {
            return Err(DomainError::Conflict(format!(
                "order {} was modified concurrently",
                order.order_number
            )));
        }
        order.status = status;
        order.version += 1;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    fn update_status_bulk(
        &self,
        ids: &[Uuid],
        status: OrderStatus,
    ) -> Result<Vec<OrderView>, DomainError> {
        let mut state = self.inner.lock().unwrap();
        if ids.iter().any(|id| !state.orders.contains_key(id)) {
            return Err(DomainError::NotFound("missing order".into()));
        }
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            let order = state.orders.get_mut(id).unwrap();
            order.status = status;
            order.version += 1;
            order.updated_at = Utc::now();
            updated.push(order.clone());
        }
        Ok(updated)
    }

    fn update_fulfillment(
        &self,
        id: Uuid,
        tracking_number: &str,
        shipping_carrier: &str,
        estimated_delivery: Option<DateTime<Utc>>,
        expected_version: i64,
    ) -> Result<OrderView, DomainError> {
        let mut state = self.inner.lock().unwrap();
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;
        if order.version != expected_version {
            return Err(DomainError::Conflict(format!(
                "order {} was modified concurrently",
                order.order_number
            )));
        }
        order.tracking_number = Some(tracking_number.to_string());
        order.shipping_carrier = Some(shipping_carrier.to_string());
        order.estimated_delivery = estimated_delivery;
        order.version += 1;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    fn apply_refund(
        &self,
        id: Uuid,
        update: &RefundUpdate,
        expected_version: i64,
    ) -> Result<OrderView, DomainError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_apply_refund {
            return Err(DomainError::Internal("data store unavailable".into()));
        }
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;
        if order.version != expected_version {
            return Err(DomainError::Conflict(format!(
                "order {} was modified concurrently",
                order.order_number
            )));
        }
        order.refund_amount_cents = Some(update.refund_amount_cents);
        order.refund_reason = Some(update.reason.clone());
        order.refunded_at = Some(update.refunded_at);
        if let Some(status) = update.new_status {
            order.status = status;
        }
        order.version += 1;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    fn record_reconciliation(&self, rec: &NewReconciliation) -> Result<Uuid, DomainError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_record_reconciliation {
            return Err(DomainError::Internal("data store unavailable".into()));
        }
        let id = Uuid::new_v4();
        state.reconciliations.push(Reconciliation {
            id,
            order_id: rec.order_id,
            processor_refund_id: rec.processor_refund_id.clone(),
            amount_cents: rec.amount_cents,
            applied: false,
        });
        Ok(id)
    }

    fn mark_reconciliation_applied(&self, id: Uuid) -> Result<(), DomainError> {
        let mut state = self.inner.lock().unwrap();
        let rec = state
            .reconciliations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;
        rec.applied = true;
        Ok(())
    }

    fn export_page(
        &self,
        filter: &OrderFilter,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ExportRecord>, DomainError> {
        let mut state = self.inner.lock().unwrap();
        state.export_fetches += 1;
        let mut records: Vec<ExportRecord> = state
            .orders
            .values()
            .filter(|o| matches_filter(o, state.contacts.get(&o.customer_id), filter))
            .filter(|o| after.is_none_or(|a| o.order_number.as_str() > a))
            .map(|o| {
                let contact = state.contacts.get(&o.customer_id);
                ExportRecord {
                    order_number: o.order_number.clone(),
                    customer_name: contact.map(|c| c.name.clone()).unwrap_or_default(),
                    customer_email: contact.map(|c| c.email.clone()).unwrap_or_default(),
                    status: o.status,
                    subtotal_cents: o.subtotal_cents,
                    tax_cents: o.tax_cents,
                    shipping_cents: o.shipping_cents,
                    total_cents: o.total_cents,
                    refund_amount_cents: o.refund_amount_cents,
                    tracking_number: o.tracking_number.clone(),
                    shipping_carrier: o.shipping_carrier.clone(),
                    created_at: o.created_at,
                }
            })
            .collect();
        records.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        records.truncate(limit as usize);
        Ok(records)
    }

    fn sales_summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<SalesSummary, DomainError> {
        let state = self.inner.lock().unwrap();
        let in_range = state.orders.values().filter(|o| {
            from.is_none_or(|f| o.created_at >= f) && to.is_none_or(|t| o.created_at < t)
        });
        let mut summary = SalesSummary {
            order_count: 0,
            gross_cents: 0,
            refunded_cents: 0,
            net_cents: 0,
        };
        for order in in_range {
            summary.order_count += 1;
            summary.gross_cents += order.total_cents;
            summary.refunded_cents += order.refunded_cents();
        }
        summary.net_cents = summary.gross_cents - summary.refunded_cents;
        Ok(summary)
    }

    fn status_breakdown(&self) -> Result<Vec<StatusCount>, DomainError> {
        let state = self.inner.lock().unwrap();
        let mut counts: Vec<StatusCount> = Vec::new();
        for status in OrderStatus::ALL {
            let count = state.orders.values().filter(|o| o.status == status).count() as i64;
            if count > 0 {
                counts.push(StatusCount { status, count });
            }
        }
        Ok(counts)
    }

    fn customer_contact(&self, customer_id: Uuid) -> Result<Option<CustomerContact>, DomainError> {
        Ok(self.inner.lock().unwrap().contacts.get(&customer_id).cloned())
    }
}

/// Fixture with a paid total of `total_cents`, no refund yet.
pub fn order_fixture(number: &str, status: OrderStatus, total_cents: i64) -> OrderView {
    OrderView {
        id: Uuid::new_v4(),
        order_number: number.to_string(),
        customer_id: Uuid::new_v4(),
        status,
        subtotal_cents: total_cents - 300,
        tax_cents: 200,
        shipping_cents: 100,
        total_cents,
        refund_amount_cents: None,
        refund_reason: None,
        refunded_at: None,
        tracking_number: None,
        shipping_carrier: None,
        estimated_delivery: None,
        payment_reference: Some(format!("pay_{number}")),
        version: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        lines: vec![],
    }
}

// ── Payment gateway ──────────────────────────────────────────────────────────

#[derive(Default)]
struct GatewayState {
    calls: Vec<(String, i64, String)>,
    fail: bool,
}

#[derive(Clone, Default)]
pub struct RecordingGateway {
    inner: Arc<Mutex<GatewayState>>,
}

impl RecordingGateway {
    pub fn calls(&self) -> Vec<(String, i64, String)> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn fail_refunds(&self) {
        self.inner.lock().unwrap().fail = true;
    }
}

impl crate::domain::ports::PaymentGateway for RecordingGateway {
    fn refund(
        &self,
        payment_reference: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<crate::domain::ports::ProcessorRefund, DomainError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push((
            payment_reference.to_string(),
            amount_cents,
            idempotency_key.to_string(),
        ));
        if state.fail {
            return Err(DomainError::PaymentFailed("processor declined".into()));
        }
        Ok(crate::domain::ports::ProcessorRefund {
            id: format!("re_{}", state.calls.len()),
            status: "succeeded".into(),
        })
    }
}

// ── Cache store ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, String>,
    fail: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryCacheStore {
    inner: Arc<Mutex<CacheState>>,
}

impl InMemoryCacheStore {
    pub fn fail_everything(&self) {
        self.inner.lock().unwrap().fail = true;
    }
}

fn glob_match(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let state = self.inner.lock().unwrap();
        if state.fail {
            return Err(CacheError("forced failure".into()));
        }
        Ok(state.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<(), CacheError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail {
            return Err(CacheError("forced failure".into()));
        }
        state.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let state = self.inner.lock().unwrap();
        if state.fail {
            return Err(CacheError("forced failure".into()));
        }
        let mut matches: Vec<String> = state
            .entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        matches.sort();
        let start = cursor as usize;
        let page: Vec<String> = matches.iter().skip(start).take(count).cloned().collect();
        let consumed = start + page.len();
        let next = if consumed >= matches.len() { 0 } else { consumed as u64 };
        Ok((next, page))
    }

    fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail {
            return Err(CacheError("forced failure".into()));
        }
        for key in keys {
            state.entries.remove(key);
        }
        Ok(())
    }
}

// ── Notifier ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DomainError> {
        self.sent.lock().unwrap().push((
            recipient.to_string(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }
}

pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _recipient: &str, _subject: &str, _body: &str) -> Result<(), DomainError> {
        Err(DomainError::Internal("mail relay unavailable".into()))
    }
}
