pub mod analytics;
pub mod orders;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::list_orders,
        orders::get_order,
        orders::update_status,
        orders::bulk_update_status,
        orders::set_fulfillment,
        orders::process_refund,
        orders::export_orders,
        analytics::sales_summary,
        analytics::status_breakdown,
    ),
    components(schemas(
        crate::domain::status::OrderStatus,
        orders::OrderResponse,
        orders::OrderLineResponse,
        orders::ListOrdersResponse,
        orders::UpdateStatusRequest,
        orders::UpdateStatusResponse,
        orders::BulkStatusRequest,
        orders::BulkStatusResponse,
        orders::FulfillmentRequest,
        orders::RefundRequestDto,
        orders::RefundResponse,
        analytics::SummaryResponse,
        analytics::StatusCountResponse,
    )),
    tags(
        (name = "orders", description = "Order lifecycle administration"),
        (name = "analytics", description = "Cached reporting aggregates"),
    )
)]
pub struct ApiDoc;
