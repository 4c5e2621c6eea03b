use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, sql};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    CustomerContact, ExportRecord, ListResult, NewReconciliation, OrderFilter, OrderLineView,
    OrderView, RefundUpdate, SalesSummary, StatusCount,
};
use crate::domain::ports::OrderRepository;
use crate::domain::status::OrderStatus;
use crate::schema::{customers, order_lines, orders, refund_reconciliation};

use super::models::{CustomerRow, NewReconciliationRow, OrderLineRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Repository ───────────────────────────────────────────────────────────────

type PgConn = diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<diesel::PgConnection>>;

const RECONCILIATION_PENDING: &str = "PENDING";
const RECONCILIATION_APPLIED: &str = "APPLIED";

#[derive(Clone)]
pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn view_by_id(conn: &mut PgConn, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let order = orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first(conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let lines = order_lines::table
            .filter(order_lines::order_id.eq(order.id))
            .select(OrderLineRow::as_select())
            .load(conn)?;

        Ok(Some(to_view(order, lines)?))
    }

    fn reload_view(conn: &mut PgConn, id: Uuid) -> Result<OrderView, DomainError> {
        Self::view_by_id(conn, id)?
            .ok_or_else(|| DomainError::Internal(format!("order {id} vanished mid-update")))
    }

    /// Disambiguate a compare-and-swap update that matched no rows.
    fn stale_row_error(conn: &mut PgConn, id: Uuid) -> DomainError {
        match orders::table
            .filter(orders::id.eq(id))
            .count()
            .get_result::<i64>(conn)
        {
            Ok(0) => DomainError::NotFound(id.to_string()),
            Ok(_) => DomainError::Conflict(format!("order {id} was modified concurrently")),
            Err(e) => e.into(),
        }
    }
}

fn parse_status(raw: &str, order_id: Uuid) -> Result<OrderStatus, DomainError> {
    raw.parse().map_err(|_| {
        DomainError::Internal(format!("unexpected status '{raw}' on order {order_id}"))
    })
}

fn to_view(order: OrderRow, lines: Vec<OrderLineRow>) -> Result<OrderView, DomainError> {
    let status = parse_status(&order.status, order.id)?;
    Ok(OrderView {
        id: order.id,
        order_number: order.order_number,
        customer_id: order.customer_id,
        status,
        subtotal_cents: order.subtotal_cents,
        tax_cents: order.tax_cents,
        shipping_cents: order.shipping_cents,
        total_cents: order.total_cents,
        refund_amount_cents: order.refund_amount_cents,
        refund_reason: order.refund_reason,
        refunded_at: order.refunded_at,
        tracking_number: order.tracking_number,
        shipping_carrier: order.shipping_carrier,
        estimated_delivery: order.estimated_delivery,
        payment_reference: order.payment_reference,
        version: order.version,
        created_at: order.created_at,
        updated_at: order.updated_at,
        lines: lines
            .into_iter()
            .map(|l| OrderLineView {
                id: l.id,
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price_cents: l.unit_price_cents,
            })
            .collect(),
    })
}

type BoxedOrdersQuery<'a> = diesel::helper_types::IntoBoxed<
    'a,
    diesel::helper_types::InnerJoin<orders::table, customers::table>,
    diesel::pg::Pg,
>;

/// Apply the shared listing/export predicates to a boxed orders+customers
/// join.
fn apply_filter(
    mut query: BoxedOrdersQuery<'static>,
    filter: &OrderFilter,
) -> BoxedOrdersQuery<'static> {
    if let Some(status) = filter.status {
        query = query.filter(orders::status.eq(status.as_str()));
    }
    if let Some(from) = filter.created_from {
        query = query.filter(orders::created_at.ge(from));
    }
    if let Some(to) = filter.created_to {
        query = query.filter(orders::created_at.lt(to));
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        query = query.filter(
            orders::order_number
                .ilike(pattern.clone())
                .or(customers::name.ilike(pattern.clone()))
                .or(customers::email.ilike(pattern)),
        );
    }
    query
}

fn filtered(filter: &OrderFilter) -> BoxedOrdersQuery<'static> {
    apply_filter(orders::table.inner_join(customers::table).into_boxed(), filter)
}

impl OrderRepository for DieselOrderRepository {
    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;
        Self::view_by_id(&mut conn, id)
    }

    fn find_many(&self, ids: &[Uuid]) -> Result<Vec<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order_rows: Vec<OrderRow> = orders::table
            .filter(orders::id.eq_any(ids))
            .select(OrderRow::as_select())
            .load(&mut conn)?;

        let line_rows: Vec<OrderLineRow> = OrderLineRow::belonging_to(&order_rows)
            .select(OrderLineRow::as_select())
            .load(&mut conn)?;

        line_rows
            .grouped_by(&order_rows)
            .into_iter()
            .zip(order_rows)
            .map(|(lines, order)| to_view(order, lines))
            .collect()
    }

    fn list(&self, filter: &OrderFilter, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;
        let offset = (page - 1) * limit;

        conn.transaction::<_, DomainError, _>(|conn| {
            let total: i64 = filtered(filter).count().get_result(conn)?;

            let rows: Vec<OrderRow> = filtered(filter)
                .select(OrderRow::as_select())
                .order(orders::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;

            let items = rows
                .into_iter()
                .map(|o| to_view(o, vec![]))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(ListResult { items, total })
        })
    }

    fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        expected_version: i64,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        let matched = diesel::update(
            orders::table
                .filter(orders::id.eq(id))
                .filter(orders::version.eq(expected_version)),
        )
        .set((
            orders::status.eq(status.as_str()),
            orders::version.eq(expected_version + 1),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        if matched == 0 {
            return Err(Self::stale_row_error(&mut conn, id));
        }
        Self::reload_view(&mut conn, id)
    }

    fn update_status_bulk(
        &self,
        ids: &[Uuid],
        status: OrderStatus,
    ) -> Result<Vec<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let matched = diesel::update(orders::table.filter(orders::id.eq_any(ids)))
                .set((
                    orders::status.eq(status.as_str()),
                    orders::version.eq(orders::version + 1),
                    orders::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            // A short count means a row disappeared between validation and
            // here; rolling back keeps the batch all-or-nothing.
            if matched != ids.len() {
                return Err(DomainError::Conflict(format!(
                    "bulk update matched {matched} of {} orders",
                    ids.len()
                )));
            }

            let order_rows: Vec<OrderRow> = orders::table
                .filter(orders::id.eq_any(ids))
                .select(OrderRow::as_select())
                .load(conn)?;

            order_rows
                .into_iter()
                .map(|o| to_view(o, vec![]))
                .collect()
        })
    }

    fn update_fulfillment(
        &self,
        id: Uuid,
        tracking_number: &str,
        shipping_carrier: &str,
        estimated_delivery: Option<DateTime<Utc>>,
        expected_version: i64,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        let matched = diesel::update(
            orders::table
                .filter(orders::id.eq(id))
                .filter(orders::version.eq(expected_version)),
        )
        .set((
            orders::tracking_number.eq(tracking_number),
            orders::shipping_carrier.eq(shipping_carrier),
            orders::estimated_delivery.eq(estimated_delivery),
            orders::version.eq(expected_version + 1),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        if matched == 0 {
            return Err(Self::stale_row_error(&mut conn, id));
        }
        Self::reload_view(&mut conn, id)
    }

    fn apply_refund(
        &self,
        id: Uuid,
        update: &RefundUpdate,
        expected_version: i64,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        let matched = match update.new_status {
            Some(status) => diesel::update(
                orders::table
                    .filter(orders::id.eq(id))
                    .filter(orders::version.eq(expected_version)),
            )
            .set((
                orders::refund_amount_cents.eq(update.refund_amount_cents),
                orders::refund_reason.eq(update.reason.as_str()),
                orders::refunded_at.eq(update.refunded_at),
                orders::status.eq(status.as_str()),
                orders::version.eq(expected_version + 1),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?,
            None => diesel::update(
                orders::table
                    .filter(orders::id.eq(id))
                    .filter(orders::version.eq(expected_version)),
            )
            .set((
                orders::refund_amount_cents.eq(update.refund_amount_cents),
                orders::refund_reason.eq(update.reason.as_str()),
                orders::refunded_at.eq(update.refunded_at),
                orders::version.eq(expected_version + 1),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?,
        };

        if matched == 0 {
            return Err(Self::stale_row_error(&mut conn, id));
        }
        Self::reload_view(&mut conn, id)
    }

    fn record_reconciliation(&self, rec: &NewReconciliation) -> Result<Uuid, DomainError> {
        let mut conn = self.pool.get()?;
        let id = Uuid::new_v4();
        diesel::insert_into(refund_reconciliation::table)
            .values(&NewReconciliationRow {
                id,
                order_id: rec.order_id,
                processor_refund_id: rec.processor_refund_id.clone(),
                amount_cents: rec.amount_cents,
                state: RECONCILIATION_PENDING.to_string(),
            })
            .execute(&mut conn)?;
        Ok(id)
    }

    fn mark_reconciliation_applied(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        let matched = diesel::update(refund_reconciliation::table.find(id))
            .set(refund_reconciliation::state.eq(RECONCILIATION_APPLIED))
            .execute(&mut conn)?;
        if matched == 0 {
            return Err(DomainError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn export_page(
        &self,
        filter: &OrderFilter,
        after: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ExportRecord>, DomainError> {
        let mut conn = self.pool.get()?;

        let mut query = filtered(filter);
        if let Some(after) = after {
            query = query.filter(orders::order_number.gt(after.to_string()));
        }

        let rows: Vec<(OrderRow, CustomerRow)> = query
            .select((OrderRow::as_select(), CustomerRow::as_select()))
            .order(orders::order_number.asc())
            .limit(limit)
            .load(&mut conn)?;

        rows.into_iter()
            .map(|(order, customer)| {
                let status = parse_status(&order.status, order.id)?;
                Ok(ExportRecord {
                    order_number: order.order_number,
                    customer_name: customer.name,
                    customer_email: customer.email,
                    status,
                    subtotal_cents: order.subtotal_cents,
                    tax_cents: order.tax_cents,
                    shipping_cents: order.shipping_cents,
                    total_cents: order.total_cents,
                    refund_amount_cents: order.refund_amount_cents,
                    tracking_number: order.tracking_number,
                    shipping_carrier: order.shipping_carrier,
                    created_at: order.created_at,
                })
            })
            .collect()
    }

    fn sales_summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<SalesSummary, DomainError> {
        let mut conn = self.pool.get()?;

        let mut query = orders::table.into_boxed();
        if let Some(from) = from {
            query = query.filter(orders::created_at.ge(from));
        }
        if let Some(to) = to {
            query = query.filter(orders::created_at.lt(to));
        }

        // SUM over bigint widens to numeric in Postgres; cast back down so
        // the result maps onto i64.
        let (order_count, gross_cents, refunded_cents): (i64, i64, i64) = query
            .select((
                sql::<BigInt>("COUNT(*)"),
                sql::<BigInt>("COALESCE(SUM(total_cents), 0)::bigint"),
                sql::<BigInt>("COALESCE(SUM(COALESCE(refund_amount_cents, 0)), 0)::bigint"),
            ))
            .get_result(&mut conn)?;

        Ok(SalesSummary {
            order_count,
            gross_cents,
            refunded_cents,
            net_cents: gross_cents - refunded_cents,
        })
    }

    fn status_breakdown(&self) -> Result<Vec<StatusCount>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows: Vec<(String, i64)> = orders::table
            .group_by(orders::status)
            .select((orders::status, count_star()))
            .load(&mut conn)?;

        rows.into_iter()
            .map(|(raw, count)| {
                let status = raw.parse().map_err(|_| {
                    DomainError::Internal(format!("unexpected status '{raw}' in breakdown"))
                })?;
                Ok(StatusCount { status, count })
            })
            .collect()
    }

    fn customer_contact(&self, customer_id: Uuid) -> Result<Option<CustomerContact>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = customers::table
            .find(customer_id)
            .select(CustomerRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(|c| CustomerContact {
            name: c.name,
            email: c.email,
        }))
    }
}
