//! NF-e document parsing: envelope normalization and field extraction.

pub mod envelope;
mod extractor;
pub mod rules;

pub use envelope::{normalize, CanonicalInvoiceInfo, EnvelopeShape};
pub use extractor::FieldExtractor;

use tracing::trace;

use crate::error::DocumentError;
use crate::models::config::ExtractionConfig;
use crate::models::{InvoiceRecord, RawDocument};
use crate::xml::parse_document;

/// Result type for document parsing.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Trait for turning one raw document into a record.
///
/// Implementations must be pure: the same bytes always yield the same record.
pub trait InvoiceParser {
    /// Parse a single document.
    fn parse(&self, document: &RawDocument) -> Result<InvoiceRecord>;
}

/// Decode → normalize → extract for NF-e XML.
#[derive(Debug, Clone, Default)]
pub struct NfeParser {
    extractor: FieldExtractor,
}

impl NfeParser {
    /// Create a parser with default extraction settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser from the extraction section of the configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            extractor: FieldExtractor::new()
                .with_issuer_id_validation(config.validate_issuer_id)
                .with_cpf_issuers(config.accept_cpf_issuer),
        }
    }

    /// Replace the field extractor.
    pub fn with_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }
}

impl InvoiceParser for NfeParser {
    fn parse(&self, document: &RawDocument) -> Result<InvoiceRecord> {
        trace!(source = %document.name, bytes = document.bytes.len(), "parsing document");
        let tree = parse_document(&document.bytes)?;
        let info = normalize(&tree)?;
        trace!(source = %document.name, shape = %info.shape(), "normalized envelope");
        Ok(self.extractor.extract(&info, &document.name)?)
    }
}
