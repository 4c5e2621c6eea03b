use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::DomainError;

/// Closed set of order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Legal successor statuses. `Delivered` and `Cancelled` are terminal
    /// and have none.
    fn successors(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered, OrderStatus::Cancelled],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::Validation(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

/// Outcome of checking one requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub valid: bool,
    /// Advisory only. Callers surface it to the operator but never treat it
    /// as an error.
    pub warning: Option<&'static str>,
}

pub const IN_TRANSIT_WARNING: &str =
    "order has already shipped; the package may be in transit and the customer may still receive it";

/// Decide whether `requested` is a legal next status for `current`.
///
/// Pure and total: every one of the 25 possible pairs has a defined outcome.
/// The single advisory case is `Shipped -> Cancelled`, which is allowed but
/// carries a warning for the operator.
pub fn validate_transition(current: OrderStatus, requested: OrderStatus) -> Transition {
    let valid = current.successors().contains(&requested);
    let warning = (valid
        && current == OrderStatus::Shipped
        && requested == OrderStatus::Cancelled)
        .then_some(IN_TRANSIT_WARNING);
    Transition { valid, warning }
}
