use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::analytics::ANALYTICS_KEY_PATTERN;
use crate::application::outbound::OutboundQueue;
use crate::domain::errors::DomainError;
use crate::domain::order::{format_minor_units, ListResult, OrderFilter, OrderView};
use crate::domain::ports::OrderRepository;
use crate::domain::status::{validate_transition, OrderStatus};

/// Result of a bulk status change: the updated orders plus any advisory
/// warnings (currently only the shipped-then-cancelled case).
#[derive(Debug)]
pub struct BulkUpdateOutcome {
    pub orders: Vec<OrderView>,
    pub warnings: Vec<String>,
}

pub struct OrderService<R> {
    repo: R,
    outbound: OutboundQueue,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R, outbound: OutboundQueue) -> Self {
        Self { repo, outbound }
    }

    pub fn get_order(&self, id: Uuid) -> Result<OrderView, DomainError> {
        self.repo
            .find_by_id(id)?
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    pub fn list_orders(
        &self,
        filter: &OrderFilter,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        self.repo.list(filter, page, limit)
    }

    /// Change one order's status, gated by the transition table. Returns the
    /// updated order and the advisory warning, if any.
    pub fn update_status(
        &self,
        id: Uuid,
        target: OrderStatus,
    ) -> Result<(OrderView, Option<&'static str>), DomainError> {
        let order = self.get_order(id)?;
        let transition = validate_transition(order.status, target);
        if !transition.valid {
            return Err(DomainError::Validation(format!(
                "order {} cannot move from {} to {}",
                order.order_number, order.status, target
            )));
        }
        let updated = self.repo.update_status(id, target, order.version)?;
        self.dispatch_status_change(&updated);
        self.outbound.invalidate_cache(ANALYTICS_KEY_PATTERN);
        Ok((updated, transition.warning))
    }

    /// All-or-nothing bulk status change.
    ///
    /// Every referenced order is fetched and every transition validated
    /// before anything is written; a single missing id or illegal transition
    /// rejects the whole batch with every offender named. Only then are all
    /// rows updated inside one transaction.
    pub fn update_status_bulk(
        &self,
        ids: &[Uuid],
        target: OrderStatus,
    ) -> Result<BulkUpdateOutcome, DomainError> {
        if ids.is_empty() {
            return Err(DomainError::Validation("no order ids given".into()));
        }

        let orders = self.repo.find_many(ids)?;
        if orders.len() != ids.len() {
            let found: HashSet<Uuid> = orders.iter().map(|o| o.id).collect();
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(ToString::to_string)
                .collect();
            return Err(DomainError::NotFound(format!(
                "orders not found: {}",
                missing.join(", ")
            )));
        }

        let mut invalid = Vec::new();
        let mut warnings = Vec::new();
        for order in &orders {
            let transition = validate_transition(order.status, target);
            if !transition.valid {
                invalid.push(format!("{} ({})", order.order_number, order.status));
            } else if let Some(warning) = transition.warning {
                warnings.push(format!("{}: {warning}", order.order_number));
            }
        }
        if !invalid.is_empty() {
            return Err(DomainError::Validation(format!(
                "cannot transition to {target}: {}",
                invalid.join(", ")
            )));
        }

        let updated = self.repo.update_status_bulk(ids, target)?;
        for order in &updated {
            self.dispatch_status_change(order);
        }
        self.outbound.invalidate_cache(ANALYTICS_KEY_PATTERN);
        Ok(BulkUpdateOutcome {
            orders: updated,
            warnings,
        })
    }

    /// Attach or amend tracking details. Tracking number and carrier are set
    /// together or not at all, and only while the order is `Processing` (to
    /// add) or `Shipped` (to amend).
    pub fn set_fulfillment(
        &self,
        id: Uuid,
        tracking_number: &str,
        shipping_carrier: &str,
        estimated_delivery: Option<DateTime<Utc>>,
    ) -> Result<OrderView, DomainError> {
        if tracking_number.trim().is_empty() || shipping_carrier.trim().is_empty() {
            return Err(DomainError::Validation(
                "tracking number and shipping carrier must be provided together".into(),
            ));
        }
        let order = self.get_order(id)?;
        if !matches!(order.status, OrderStatus::Processing | OrderStatus::Shipped) {
            return Err(DomainError::Validation(format!(
                "order {} in status {} cannot accept fulfillment details",
                order.order_number, order.status
            )));
        }
        self.repo.update_fulfillment(
            id,
            tracking_number,
            shipping_carrier,
            estimated_delivery,
            order.version,
        )
    }

    fn dispatch_status_change(&self, order: &OrderView) {
        let contact = match self.repo.customer_contact(order.customer_id) {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                log::warn!(
                    "no contact for customer {} of order {}; skipping notification",
                    order.customer_id,
                    order.order_number
                );
                return;
            }
            Err(e) => {
                log::warn!(
                    "contact lookup for order {} failed: {e}; skipping notification",
                    order.order_number
                );
                return;
            }
        };
        let subject = format!("Your order {} is now {}", order.order_number, order.status);
        let mut body = format!(
            "Hello {},\n\nOrder {} ({} USD) has moved to status {}.",
            contact.name,
            order.order_number,
            format_minor_units(order.total_cents),
            order.status
        );
        if let (Some(tracking), Some(carrier)) = (&order.tracking_number, &order.shipping_carrier) {
            body.push_str(&format!("\nTracking: {tracking} via {carrier}."));
        }
        self.outbound.notify(contact.email, subject, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::outbound;
    use crate::application::test_support::{order_fixture, InMemoryOrders};
    use super::OrderStatus::*;

    fn service(repo: InMemoryOrders) -> OrderService<InMemoryOrders> {
        let (queue, _rx) = outbound::channel();
        OrderService::new(repo, queue)
    }

    fn seed(repo: &InMemoryOrders, number: &str, status: OrderStatus) -> Uuid {
        let order = order_fixture(number, status, 10_000);
        let id = order.id;
        repo.insert_contact(order.customer_id, "Ada Lovelace", "ada@example.com");
        repo.insert(order);
        id
    }

    #[test]
    fn update_status_follows_transition_table() {
        let repo = InMemoryOrders::default();
        let id = seed(&repo, "ORD-1", Pending);
        let svc = service(repo.clone());

        let (updated, warning) = svc.update_status(id, Processing).unwrap();
        assert_eq!(updated.status, Processing);
        assert!(warning.is_none());
        assert_eq!(repo.get(id).version, 1);
    }

    #[test]
    fn update_status_rejects_illegal_transition() {
        let repo = InMemoryOrders::default();
        let id = seed(&repo, "ORD-1", Pending);
        let svc = service(repo.clone());

        let err = svc.update_status(id, Delivered).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(repo.get(id).status, Pending);
    }

    #[test]
    fn update_status_surfaces_in_transit_warning() {
        let repo = InMemoryOrders::default();
        let id = seed(&repo, "ORD-1", Shipped);
        let svc = service(repo);

        let (updated, warning) = svc.update_status(id, Cancelled).unwrap();
        assert_eq!(updated.status, Cancelled);
        assert!(warning.is_some());
    }

    #[test]
    fn update_status_missing_order_is_not_found() {
        let svc = service(InMemoryOrders::default());
        let err = svc.update_status(Uuid::new_v4(), Processing).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn bulk_update_empty_id_set_is_rejected() {
        let svc = service(InMemoryOrders::default());
        let err = svc.update_status_bulk(&[], Shipped).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn bulk_update_missing_id_fails_before_any_mutation() {
        let repo = InMemoryOrders::default();
        let a = seed(&repo, "ORD-A", Processing);
        let ghost = Uuid::new_v4();
        let svc = service(repo.clone());

        let err = svc.update_status_bulk(&[a, ghost], Shipped).unwrap_err();

        match err {
            DomainError::NotFound(msg) => assert!(msg.contains(&ghost.to_string())),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(repo.get(a).status, Processing);
    }

    #[test]
    fn bulk_update_one_bad_member_leaves_all_unchanged() {
        let repo = InMemoryOrders::default();
        let a = seed(&repo, "ORD-A", Processing);
        let b = seed(&repo, "ORD-B", Delivered); // cannot move to SHIPPED
        let c = seed(&repo, "ORD-C", Processing);
        let svc = service(repo.clone());

        let err = svc.update_status_bulk(&[a, b, c], Shipped).unwrap_err();

        match err {
            DomainError::Validation(msg) => {
                assert!(msg.contains("ORD-B"), "offender must be named: {msg}");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
        for (id, status) in [(a, Processing), (b, Delivered), (c, Processing)] {
            assert_eq!(repo.get(id).status, status);
            assert_eq!(repo.get(id).version, 0, "no order may have been touched");
        }
    }

    #[test]
    fn bulk_update_applies_all_and_collects_warnings() {
        let repo = InMemoryOrders::default();
        let a = seed(&repo, "ORD-A", Shipped);
        let b = seed(&repo, "ORD-B", Processing);
        let svc = service(repo.clone());

        let outcome = svc.update_status_bulk(&[a, b], Cancelled).unwrap();

        assert_eq!(outcome.orders.len(), 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("ORD-A:"));
        assert_eq!(repo.get(a).status, Cancelled);
        assert_eq!(repo.get(b).status, Cancelled);
    }

    #[test]
    fn bulk_update_enqueues_notifications_and_invalidation() {
        let repo = InMemoryOrders::default();
        let a = seed(&repo, "ORD-A", Pending);
        let (queue, mut rx) = outbound::channel();
        let svc = OrderService::new(repo, queue);

        svc.update_status_bulk(&[a], Processing).unwrap();

        let first = rx.try_recv().expect("expected a notification task");
        assert!(matches!(
            first,
            outbound::OutboundTask::Notify { ref recipient, .. } if recipient == "ada@example.com"
        ));
        let second = rx.try_recv().expect("expected an invalidation task");
        assert!(matches!(
            second,
            outbound::OutboundTask::InvalidateCache { ref pattern } if pattern == ANALYTICS_KEY_PATTERN
        ));
    }

    #[test]
    fn fulfillment_requires_tracking_and_carrier_together() {
        let repo = InMemoryOrders::default();
        let id = seed(&repo, "ORD-1", Processing);
        let svc = service(repo);

        let err = svc.set_fulfillment(id, "1Z999", "", None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn fulfillment_allowed_while_processing_or_shipped_only() {
        let repo = InMemoryOrders::default();
        let pending = seed(&repo, "ORD-1", Pending);
        let processing = seed(&repo, "ORD-2", Processing);
        let shipped = seed(&repo, "ORD-3", Shipped);
        let svc = service(repo.clone());

        assert!(matches!(
            svc.set_fulfillment(pending, "1Z999", "UPS", None),
            Err(DomainError::Validation(_))
        ));

        let updated = svc.set_fulfillment(processing, "1Z999", "UPS", None).unwrap();
        assert_eq!(updated.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(updated.shipping_carrier.as_deref(), Some("UPS"));

        // amending after shipment is allowed
        let amended = svc.set_fulfillment(shipped, "1Z000", "FedEx", None).unwrap();
        assert_eq!(amended.tracking_number.as_deref(), Some("1Z000"));
    }
}
