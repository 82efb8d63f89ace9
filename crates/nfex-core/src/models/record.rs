//! Per-document records and the raw documents they come from.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `source_name` of the synthetic aggregate row.
pub const AGGREGATE_SOURCE_NAME: &str = "TOTAL";

/// An uploaded document, fully buffered.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Original filename.
    pub name: String,

    /// Raw XML bytes.
    pub bytes: Vec<u8>,
}

impl RawDocument {
    /// Create a document from a name and its content.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a document from disk, naming it after the file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// One row of the report: a parsed invoice or the aggregate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Originating filename, or [`AGGREGATE_SOURCE_NAME`].
    pub source_name: String,

    /// Issuer CNPJ (or CPF). Empty on the aggregate row.
    pub issuer_id: String,

    /// Issuer legal name. Empty on the aggregate row.
    pub issuer_name: String,

    /// Invoice total (`vNF`).
    pub invoice_total: Decimal,

    /// ICMS total (`vICMS`).
    pub tax_total: Decimal,
}

impl InvoiceRecord {
    /// Build the synthetic aggregate row.
    pub fn aggregate(invoice_sum: Decimal, tax_sum: Decimal) -> Self {
        Self {
            source_name: AGGREGATE_SOURCE_NAME.to_string(),
            issuer_id: String::new(),
            issuer_name: String::new(),
            invoice_total: invoice_sum,
            tax_total: tax_sum,
        }
    }

    /// Whether this is the synthetic aggregate row.
    ///
    /// Extracted records always carry a non-empty issuer, so a document
    /// that happens to be named `TOTAL` is not mistaken for the aggregate.
    pub fn is_aggregate(&self) -> bool {
        self.source_name == AGGREGATE_SOURCE_NAME
            && self.issuer_id.is_empty()
            && self.issuer_name.is_empty()
    }
}
