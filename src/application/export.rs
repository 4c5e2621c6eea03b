//! Cursor-paginated CSV export.
//!
//! The result set may be unbounded, so nothing here ever holds more than one
//! fetch batch in memory: rows are produced lazily, pulling the next batch
//! from the repository only when the previous one is drained.

use std::borrow::Cow;
use std::collections::VecDeque;

use crate::domain::errors::DomainError;
use crate::domain::order::{format_minor_units, ExportRecord, OrderFilter};
use crate::domain::ports::OrderRepository;

pub const EXPORT_BATCH_SIZE: i64 = 100;

const HEADER_FIELDS: [&str; 12] = [
    "order_number",
    "customer_name",
    "customer_email",
    "status",
    "subtotal",
    "tax",
    "shipping",
    "total",
    "refund_amount",
    "tracking_number",
    "shipping_carrier",
    "created_at",
];

pub struct ExportService<R> {
    repo: R,
}

impl<R: OrderRepository + Clone> ExportService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn stream(&self, filter: OrderFilter) -> ExportStream<R> {
        ExportStream::new(self.repo.clone(), filter)
    }
}

/// Lazy, finite, non-restartable sequence of CSV rows (without line
/// terminators). The header row comes first; batches are keyed on the last
/// order number seen, over a stable `order_number` ascending sort, until a
/// short batch signals exhaustion.
pub struct ExportStream<R> {
    repo: R,
    filter: OrderFilter,
    cursor: Option<String>,
    buffer: VecDeque<ExportRecord>,
    header_emitted: bool,
    exhausted: bool,
    failed: bool,
}

impl<R: OrderRepository> ExportStream<R> {
    fn new(repo: R, filter: OrderFilter) -> Self {
        Self {
            repo,
            filter,
            cursor: None,
            buffer: VecDeque::new(),
            header_emitted: false,
            exhausted: false,
            failed: false,
        }
    }

    fn refill(&mut self) -> Result<(), DomainError> {
        let batch = self
            .repo
            .export_page(&self.filter, self.cursor.as_deref(), EXPORT_BATCH_SIZE)?;
        if (batch.len() as i64) < EXPORT_BATCH_SIZE {
            self.exhausted = true;
        }
        if let Some(last) = batch.last() {
            self.cursor = Some(last.order_number.clone());
        }
        self.buffer.extend(batch);
        Ok(())
    }
}

impl<R: OrderRepository> Iterator for ExportStream<R> {
    type Item = Result<String, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if !self.header_emitted {
            self.header_emitted = true;
            return Some(Ok(csv_row(HEADER_FIELDS.iter().copied())));
        }
        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.refill() {
                self.failed = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(|record| Ok(render_row(&record)))
    }
}

fn render_row(record: &ExportRecord) -> String {
    let fields = [
        record.order_number.clone(),
        record.customer_name.clone(),
        record.customer_email.clone(),
        record.status.to_string(),
        format_minor_units(record.subtotal_cents),
        format_minor_units(record.tax_cents),
        format_minor_units(record.shipping_cents),
        format_minor_units(record.total_cents),
        record
            .refund_amount_cents
            .map(format_minor_units)
            .unwrap_or_default(),
        record.tracking_number.clone().unwrap_or_default(),
        record.shipping_carrier.clone().unwrap_or_default(),
        record.created_at.to_rfc3339(),
    ];
    csv_row(fields.iter().map(String::as_str))
}

fn csv_row<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(",")
}

/// Field quoting: a field containing the delimiter, a quote or a line break
/// is wrapped in quotes with internal quotes doubled.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains(['"', ',', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
