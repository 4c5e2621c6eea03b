//! Refund coordination.
//!
//! The payment processor is asked first; local state changes only after the
//! processor confirms. Between those two steps a durable reconciliation row
//! records the confirmed refund, so a failed local write leaves evidence a
//! repair job can act on instead of a silently orphaned refund.

use chrono::Utc;
use uuid::Uuid;

use crate::application::analytics::ANALYTICS_KEY_PATTERN;
use crate::application::outbound::OutboundQueue;
use crate::domain::errors::DomainError;
use crate::domain::order::{format_minor_units, NewReconciliation, OrderView, RefundUpdate};
use crate::domain::ports::{OrderRepository, PaymentGateway, ProcessorRefund};
use crate::domain::status::OrderStatus;

/// One refund request as resolved by the coordinator.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_id: Uuid,
    /// Requested cents. Zero, or anything above the remaining refundable
    /// balance, means "refund the entire remaining balance".
    pub amount_cents: i64,
    pub reason: String,
    pub notes: Option<String>,
    /// Identifies one logical user action. Retries of the same action must
    /// reuse it so the processor sees the same idempotency key.
    pub attempt_id: Uuid,
}

#[derive(Debug)]
pub struct RefundOutcome {
    pub order: OrderView,
    pub refund: ProcessorRefund,
    /// Cents actually refunded by this call after amount resolution.
    pub amount_cents: i64,
}

pub struct RefundService<R, G> {
    repo: R,
    gateway: G,
    outbound: OutboundQueue,
}

impl<R: OrderRepository, G: PaymentGateway> RefundService<R, G> {
    pub fn new(repo: R, gateway: G, outbound: OutboundQueue) -> Self {
        Self {
            repo,
            gateway,
            outbound,
        }
    }

    pub fn process_refund(&self, request: &RefundRequest) -> Result<RefundOutcome, DomainError> {
        if request.amount_cents < 0 {
            return Err(DomainError::Validation(
                "refund amount must not be negative".into(),
            ));
        }

        let order = self
            .repo
            .find_by_id(request.order_id)?
            .ok_or_else(|| DomainError::NotFound(request.order_id.to_string()))?;

        let payment_reference = order.payment_reference.clone().ok_or_else(|| {
            DomainError::Validation(format!(
                "order {} has no payment reference",
                order.order_number
            ))
        })?;

        if !matches!(
            order.status,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        ) {
            return Err(DomainError::Validation(format!(
                "order {} in status {} is not refundable",
                order.order_number, order.status
            )));
        }

        let already_refunded = order.refunded_cents();
        if already_refunded >= order.total_cents {
            return Err(DomainError::Validation(format!(
                "order {} is already fully refunded",
                order.order_number
            )));
        }

        let remaining = order.remaining_refundable_cents();
        let resolved = if request.amount_cents == 0 || request.amount_cents > remaining {
            remaining
        } else {
            request.amount_cents
        };

        // Re-checked even though resolution just bounded the amount:
        // resolution and the double-spend guard are separate guarantees.
        if already_refunded + resolved > order.total_cents {
            return Err(DomainError::Validation(format!(
                "refund of {} cents exceeds the refundable balance of order {}",
                resolved, order.order_number
            )));
        }

        let key = idempotency_key(order.id, resolved, request.attempt_id);
        let refund = self.gateway.refund(&payment_reference, resolved, &key)?;

        // Money has moved. Journal the confirmed refund before touching the
        // order row; if the write below fails, this row is what a
        // reconciler uses to find the orphan.
        let reconciliation_id = match self.repo.record_reconciliation(&NewReconciliation {
            order_id: order.id,
            processor_refund_id: refund.id.clone(),
            amount_cents: resolved,
        }) {
            Ok(id) => Some(id),
            Err(e) => {
                log::error!(
                    "could not journal refund {} for order {}: {e}",
                    refund.id,
                    order.order_number
                );
                None
            }
        };

        let new_refund_total = already_refunded + resolved;
        let update = RefundUpdate {
            refund_amount_cents: new_refund_total,
            reason: request.reason.clone(),
            refunded_at: Utc::now(),
            new_status: (new_refund_total >= order.total_cents
                && order.status != OrderStatus::Cancelled)
                .then_some(OrderStatus::Cancelled),
        };
        let updated = self.repo.apply_refund(order.id, &update, order.version)?;

        if let Some(id) = reconciliation_id {
            if let Err(e) = self.repo.mark_reconciliation_applied(id) {
                log::warn!("could not mark refund reconciliation {id} applied: {e}");
            }
        }

        self.dispatch_confirmation(&updated, resolved, request.notes.as_deref());
        self.outbound.invalidate_cache(ANALYTICS_KEY_PATTERN);

        Ok(RefundOutcome {
            order: updated,
            refund,
            amount_cents: resolved,
        })
    }

    fn dispatch_confirmation(&self, order: &OrderView, amount_cents: i64, notes: Option<&str>) {
        let contact = match self.repo.customer_contact(order.customer_id) {
            Ok(Some(contact)) => contact,
            Ok(None) | Err(_) => {
                log::warn!(
                    "no reachable contact for order {}; skipping refund confirmation",
                    order.order_number
                );
                return;
            }
        };
        let subject = format!("Refund issued for order {}", order.order_number);
        let mut body = format!(
            "Hello {},\n\nWe have refunded {} USD on order {}.",
            contact.name,
            format_minor_units(amount_cents),
            order.order_number
        );
        if let Some(notes) = notes {
            body.push_str(&format!("\n\n{notes}"));
        }
        self.outbound.notify(contact.email, subject, body);
    }
}

/// Stable across retries of the same logical action: derived only from the
/// order, the resolved amount and the caller's attempt id. Wall-clock input
/// would hand every retry a fresh key and with it a duplicate refund.
fn idempotency_key(order_id: Uuid, amount_cents: i64, attempt_id: Uuid) -> String {
    format!("refund-{order_id}-{amount_cents}-{attempt_id}")
}
