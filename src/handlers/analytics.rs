use actix_web::web;
use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::order::{SalesSummary, StatusCount};
use crate::domain::status::OrderStatus;
use crate::errors::AppError;
use crate::AppServices;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SummaryParams {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    pub order_count: i64,
    pub gross_cents: i64,
    pub refunded_cents: i64,
    pub net_cents: i64,
}

impl From<SalesSummary> for SummaryResponse {
    fn from(s: SalesSummary) -> Self {
        SummaryResponse {
            order_count: s.order_count,
            gross_cents: s.gross_cents,
            refunded_cents: s.refunded_cents,
            net_cents: s.net_cents,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCountResponse {
    pub status: OrderStatus,
    pub count: i64,
}

impl From<StatusCount> for StatusCountResponse {
    fn from(c: StatusCount) -> Self {
        StatusCountResponse {
            status: c.status,
            count: c.count,
        }
    }
}

/// GET /analytics/summary
///
/// Order count and gross/refunded/net revenue over an optional date range.
/// Served from the cache when possible; computed directly otherwise.
#[utoipa::path(
    get,
    path = "/analytics/summary",
    params(
        ("created_from" = Option<String>, Query, description = "RFC 3339 lower bound on creation time"),
        ("created_to" = Option<String>, Query, description = "RFC 3339 upper bound on creation time"),
    ),
    responses(
        (status = 200, description = "Sales summary", body = SummaryResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn sales_summary(
    data: web::Data<AppServices>,
    query: web::Query<SummaryParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();

    let summary = web::block(move || {
        data.analytics
            .sales_summary(params.created_from, params.created_to)
            .map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(SummaryResponse::from(summary)))
}

/// GET /analytics/status-breakdown
///
/// Number of orders currently in each status.
#[utoipa::path(
    get,
    path = "/analytics/status-breakdown",
    responses(
        (status = 200, description = "Per-status order counts", body = [StatusCountResponse]),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn status_breakdown(data: web::Data<AppServices>) -> Result<HttpResponse, AppError> {
    let counts = web::block(move || data.analytics.status_breakdown().map_err(AppError::from))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let counts: Vec<StatusCountResponse> = counts.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(counts))
}
