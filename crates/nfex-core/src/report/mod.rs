//! Report building: the sorted table with its aggregate row, and the
//! artifacts rendered from it.

pub mod printable;
pub mod sheet;
pub mod store;

pub use printable::{PrintLayout, PrintOptions};
pub use store::{ReportStore, SavedReport};

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::batch::{BatchOutcome, BatchTotals};
use crate::error::DocumentFailure;
use crate::models::InvoiceRecord;

/// Records sorted for presentation, followed by exactly one aggregate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    rows: Vec<InvoiceRecord>,
}

/// Presentation order: issuer name ascending, then invoice total descending.
///
/// The remaining keys only break ties between otherwise equal rows, so
/// the order never depends on the order documents were uploaded in.
/// `Decimal` ordering ignores scale (`100.0 == 100.00`), so the scales are
/// compared last; rows equal on every key then serialize identically.
fn report_order(a: &InvoiceRecord, b: &InvoiceRecord) -> Ordering {
    a.issuer_name
        .cmp(&b.issuer_name)
        .then_with(|| b.invoice_total.cmp(&a.invoice_total))
        .then_with(|| a.source_name.cmp(&b.source_name))
        .then_with(|| a.issuer_id.cmp(&b.issuer_id))
        .then_with(|| b.tax_total.cmp(&a.tax_total))
        .then_with(|| a.invoice_total.scale().cmp(&b.invoice_total.scale()))
        .then_with(|| a.tax_total.scale().cmp(&b.tax_total.scale()))
}

impl ReportTable {
    /// Sort `records` and append the aggregate row built from the sums.
    pub fn build(mut records: Vec<InvoiceRecord>, invoice_sum: Decimal, tax_sum: Decimal) -> Self {
        records.sort_by(report_order);
        records.push(InvoiceRecord::aggregate(invoice_sum, tax_sum));
        Self { rows: records }
    }

    /// Build the table for an aggregated batch.
    pub fn from_outcome(outcome: &BatchOutcome) -> Self {
        Self::build(
            outcome.records.clone(),
            outcome.totals.invoice_sum,
            outcome.totals.tax_sum,
        )
    }

    /// Rebuild a table from stored rows, checking its shape.
    ///
    /// Returns `None` unless the last row (and only the last row) is an
    /// aggregate row.
    pub fn from_rows(rows: Vec<InvoiceRecord>) -> Option<Self> {
        let (last, body) = rows.split_last()?;
        if !last.is_aggregate() || body.iter().any(InvoiceRecord::is_aggregate) {
            return None;
        }
        Some(Self { rows })
    }

    /// All rows, aggregate row last.
    pub fn rows(&self) -> &[InvoiceRecord] {
        &self.rows
    }

    /// Per-document rows, without the aggregate row.
    pub fn records(&self) -> &[InvoiceRecord] {
        &self.rows[..self.rows.len() - 1]
    }

    /// The aggregate row.
    pub fn aggregate(&self) -> &InvoiceRecord {
        &self.rows[self.rows.len() - 1]
    }

    /// Number of per-document rows.
    pub fn len(&self) -> usize {
        self.rows.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the aggregate row equals the sums of the per-document rows.
    pub fn is_consistent(&self) -> bool {
        let aggregate = self.aggregate();
        BatchTotals::of(self.records()).is_some_and(|totals| {
            totals.invoice_sum == aggregate.invoice_total && totals.tax_sum == aggregate.tax_total
        })
    }
}

/// A skipped document as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub source_name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl From<&DocumentFailure> for FailureReport {
    fn from(failure: &DocumentFailure) -> Self {
        Self {
            source_name: failure.source_name.clone(),
            kind: failure.error.kind().to_string(),
            field: failure.error.field().map(|f| f.name().to_string()),
            message: failure.error.to_string(),
        }
    }
}

/// Batch-level response returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Number of documents included in the report.
    pub count: usize,

    /// Sum of invoice totals.
    pub invoice_sum: Decimal,

    /// Sum of ICMS totals.
    pub tax_sum: Decimal,

    /// Name of the generated spreadsheet.
    pub table_file_reference: String,

    /// Per-document records, in upload order.
    pub records: Vec<InvoiceRecord>,

    /// Documents skipped when failures are isolated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureReport>,
}

impl BatchResponse {
    pub fn new(outcome: &BatchOutcome, table_file_reference: impl Into<String>) -> Self {
        Self {
            count: outcome.records.len(),
            invoice_sum: outcome.totals.invoice_sum,
            tax_sum: outcome.totals.tax_sum,
            table_file_reference: table_file_reference.into(),
            records: outcome.records.clone(),
            failures: outcome.failures.iter().map(FailureReport::from).collect(),
        }
    }
}
