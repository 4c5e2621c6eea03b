use actix_web::web::{self, Bytes};
use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::refund_service::RefundRequest;
use crate::domain::order::{OrderFilter, OrderView};
use crate::domain::status::OrderStatus;
use crate::errors::AppError;
use crate::AppServices;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Integer minor currency units (cents).
    pub unit_price_cents: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
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
    pub refunded_at: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_carrier: Option<String>,
    pub estimated_delivery: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
    pub lines: Vec<OrderLineResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(o: OrderView) -> Self {
        OrderResponse {
            id: o.id,
            order_number: o.order_number,
            customer_id: o.customer_id,
            status: o.status,
            subtotal_cents: o.subtotal_cents,
            tax_cents: o.tax_cents,
            shipping_cents: o.shipping_cents,
            total_cents: o.total_cents,
            refund_amount_cents: o.refund_amount_cents,
            refund_reason: o.refund_reason,
            refunded_at: o.refunded_at.map(|t| t.to_rfc3339()),
            tracking_number: o.tracking_number,
            shipping_carrier: o.shipping_carrier,
            estimated_delivery: o.estimated_delivery.map(|t| t.to_rfc3339()),
            version: o.version,
            created_at: o.created_at.to_rfc3339(),
            updated_at: o.updated_at.to_rfc3339(),
            lines: o
                .lines
                .into_iter()
                .map(|l| OrderLineResponse {
                    id: l.id,
                    product_id: l.product_id,
                    quantity: l.quantity,
                    unit_price_cents: l.unit_price_cents,
                })
                .collect(),
        }
    }
}

// ── Filtering / pagination ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExportParams {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateStatusResponse {
    pub order: OrderResponse,
    /// Advisory only, e.g. cancelling an order that has already shipped.
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkStatusRequest {
    pub order_ids: Vec<Uuid>,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkStatusResponse {
    pub orders: Vec<OrderResponse>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FulfillmentRequest {
    pub tracking_number: String,
    pub shipping_carrier: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefundRequestDto {
    /// Cents to refund. Zero (the default) or anything above the remaining
    /// balance refunds the entire remaining balance.
    #[serde(default)]
    pub amount_cents: i64,
    pub reason: String,
    pub notes: Option<String>,
    /// Identifies one logical refund action. Clients retrying a failed
    /// request should resend the same id so the processor sees the same
    /// idempotency key; a fresh one is generated when absent.
    pub attempt_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundResponse {
    pub order: OrderResponse,
    pub refund_id: String,
    pub refund_status: String,
    pub amount_cents: i64,
}

fn filter_from(
    status: Option<OrderStatus>,
    search: Option<String>,
    created_from: Option<DateTime<Utc>>,
    created_to: Option<DateTime<Utc>>,
) -> OrderFilter {
    OrderFilter {
        status,
        created_from,
        created_to,
        search: search.filter(|s| !s.trim().is_empty()),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /orders
///
/// Returns a filtered, paginated list of orders (without their lines).
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
        ("status" = Option<OrderStatus>, Query, description = "Filter by status"),
        ("search" = Option<String>, Query, description = "Match order number, customer name or email"),
        ("created_from" = Option<String>, Query, description = "RFC 3339 lower bound on creation time"),
        ("created_to" = Option<String>, Query, description = "RFC 3339 upper bound on creation time"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    data: web::Data<AppServices>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);
    let filter = filter_from(
        params.status,
        params.search,
        params.created_from,
        params.created_to,
    );

    let result = web::block(move || {
        data.orders
            .list_orders(&filter, page, limit)
            .map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(OrderResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// GET /orders/{id}
///
/// Returns the order together with its lines.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    data: web::Data<AppServices>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let order = web::block(move || data.orders.get_order(id).map_err(AppError::from))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /orders/{id}/status
///
/// Moves one order to a new status, gated by the transition table. A legal
/// but risky transition (cancelling after shipment) succeeds and carries an
/// advisory warning in the response.
#[utoipa::path(
    post,
    path = "/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UpdateStatusResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order was modified concurrently"),
        (status = 422, description = "Illegal status transition"),
    ),
    tag = "orders"
)]
pub async fn update_status(
    data: web::Data<AppServices>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let target = body.into_inner().status;

    let (order, warning) =
        web::block(move || data.orders.update_status(id, target).map_err(AppError::from))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(UpdateStatusResponse {
        order: OrderResponse::from(order),
        warning: warning.map(str::to_string),
    }))
}

/// POST /orders/bulk/status
///
/// Moves every listed order to the target status, or none of them: missing
/// ids and illegal transitions reject the whole batch before anything is
/// written, naming every offender.
#[utoipa::path(
    post,
    path = "/orders/bulk/status",
    request_body = BulkStatusRequest,
    responses(
        (status = 200, description = "All orders updated", body = BulkStatusResponse),
        (status = 404, description = "One or more orders not found; nothing was changed"),
        (status = 422, description = "One or more illegal transitions; nothing was changed"),
    ),
    tag = "orders"
)]
pub async fn bulk_update_status(
    data: web::Data<AppServices>,
    body: web::Json<BulkStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();

    let outcome = web::block(move || {
        data.orders
            .update_status_bulk(&request.order_ids, request.status)
            .map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(BulkStatusResponse {
        orders: outcome.orders.into_iter().map(OrderResponse::from).collect(),
        warnings: outcome.warnings,
    }))
}

/// POST /orders/{id}/fulfillment
///
/// Attaches tracking details to a processing order, or amends them on a
/// shipped one.
#[utoipa::path(
    post,
    path = "/orders/{id}/fulfillment",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = FulfillmentRequest,
    responses(
        (status = 200, description = "Fulfillment details stored", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 422, description = "Order status does not allow fulfillment changes"),
    ),
    tag = "orders"
)]
pub async fn set_fulfillment(
    data: web::Data<AppServices>,
    path: web::Path<Uuid>,
    body: web::Json<FulfillmentRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let request = body.into_inner();

    let order = web::block(move || {
        data.orders
            .set_fulfillment(
                id,
                &request.tracking_number,
                &request.shipping_carrier,
                request.estimated_delivery,
            )
            .map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /orders/{id}/refund
///
/// Coordinates a refund: the payment processor is charged back first and the
/// order record is only updated after the processor confirms.
#[utoipa::path(
    post,
    path = "/orders/{id}/refund",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = RefundRequestDto,
    responses(
        (status = 200, description = "Refund processed", body = RefundResponse),
        (status = 404, description = "Order not found"),
        (status = 422, description = "Order is not refundable or the amount is invalid"),
        (status = 502, description = "Payment processor declined or timed out; nothing was changed"),
    ),
    tag = "orders"
)]
pub async fn process_refund(
    data: web::Data<AppServices>,
    path: web::Path<Uuid>,
    body: web::Json<RefundRequestDto>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let dto = body.into_inner();
    let request = RefundRequest {
        order_id,
        amount_cents: dto.amount_cents,
        reason: dto.reason,
        notes: dto.notes,
        attempt_id: dto.attempt_id.unwrap_or_else(Uuid::new_v4),
    };

    let outcome = web::block(move || data.refunds.process_refund(&request).map_err(AppError::from))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(RefundResponse {
        order: OrderResponse::from(outcome.order),
        refund_id: outcome.refund.id,
        refund_status: outcome.refund.status,
        amount_cents: outcome.amount_cents,
    }))
}

/// GET /orders/export
///
/// Streams matching orders as CSV. Rows are produced in fixed-size batches
/// behind a cursor, so arbitrarily large result sets stream in constant
/// memory.
#[utoipa::path(
    get,
    path = "/orders/export",
    params(
        ("status" = Option<OrderStatus>, Query, description = "Filter by status"),
        ("search" = Option<String>, Query, description = "Match order number, customer name or email"),
        ("created_from" = Option<String>, Query, description = "RFC 3339 lower bound on creation time"),
        ("created_to" = Option<String>, Query, description = "RFC 3339 upper bound on creation time"),
    ),
    responses(
        (status = 200, description = "CSV stream: header row plus one row per order", content_type = "text/csv"),
    ),
    tag = "orders"
)]
pub async fn export_orders(
    data: web::Data<AppServices>,
    query: web::Query<ExportParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let filter = filter_from(
        params.status,
        params.search,
        params.created_from,
        params.created_to,
    );

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, AppError>>(32);
    tokio::task::spawn_blocking(move || {
        for row in data.exports.stream(filter) {
            let item = match row {
                Ok(mut line) => {
                    line.push('\n');
                    Ok(Bytes::from(line))
                }
                Err(e) => Err(AppError::from(e)),
            };
            let stop = item.is_err();
            if tx.blocking_send(item).is_err() {
                // consumer went away; stop fetching
                break;
            }
            if stop {
                break;
            }
        }
    });

    let body = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(("Content-Disposition", "attachment; filename=\"orders.csv\""))
        .streaming(body))
}
