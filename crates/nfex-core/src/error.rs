//! Error types for the nfex-core library.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the nfex library.
#[derive(Error, Debug)]
pub enum NfexError {
    /// A single document could not be turned into a record.
    #[error(transparent)]
    Document(#[from] DocumentFailure),

    /// The batch was aborted.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// A report artifact could not be written or located.
    #[error(transparent)]
    ReportIo(#[from] ReportIoError),

    /// The narrative summarizer failed.
    #[error("summary error: {0}")]
    Summary(#[from] SummaryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller gave up before the result was committed.
    #[error("operation cancelled")]
    Cancelled,
}

/// The raw bytes are not well-formed XML.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The XML reader rejected the input.
    #[error("malformed XML at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Element or attribute names are not valid UTF-8.
    #[error("invalid encoding: {0}")]
    Encoding(String),

    /// The input ended before every element was closed.
    #[error("unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    /// The document holds no element at all.
    #[error("document has no root element")]
    NoRoot,

    /// Content found after the root element was closed.
    #[error("content after the root element: {0}")]
    TrailingContent(String),
}

/// The decoded tree matches none of the known NF-e wrapper shapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// No shape located an `infNFe` block.
    #[error("unrecognized NF-e envelope (top-level keys: {keys:?})")]
    Unrecognized { keys: Vec<String> },

    /// An `infNFe` block was found but lacks a required substructure.
    #[error("infNFe located via {shape} has no `{missing}` block")]
    Incomplete { shape: String, missing: &'static str },
}

/// Fields read from the canonical invoice info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    IssuerId,
    IssuerName,
    InvoiceTotal,
    TaxTotal,
}

impl Field {
    /// Column name used in reports and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Field::IssuerId => "issuer_id",
            Field::IssuerName => "issuer_name",
            Field::InvoiceTotal => "invoice_total",
            Field::TaxTotal => "tax_total",
        }
    }

    /// Location of the field inside `infNFe`.
    pub fn xml_path(&self) -> &'static str {
        match self {
            Field::IssuerId => "emit.CNPJ|emit.CPF",
            Field::IssuerName => "emit.xNome",
            Field::InvoiceTotal => "total.ICMSTot.vNF",
            Field::TaxTotal => "total.ICMSTot.vICMS",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What went wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    /// The element is absent or empty.
    Missing,
    /// The element is present but its content is unusable.
    Invalid { value: String, reason: String },
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing => f.write_str("is missing"),
            FieldProblem::Invalid { value, reason } => {
                write!(f, "has invalid value {:?} ({})", value, reason)
            }
        }
    }
}

/// A required field is missing or not usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_name}: field `{field}` ({}) {problem}", .field.xml_path())]
pub struct ExtractionError {
    pub field: Field,
    pub source_name: String,
    pub problem: FieldProblem,
}

impl ExtractionError {
    pub fn missing(field: Field, source_name: &str) -> Self {
        Self {
            field,
            source_name: source_name.to_string(),
            problem: FieldProblem::Missing,
        }
    }

    pub fn invalid(
        field: Field,
        source_name: &str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field,
            source_name: source_name.to_string(),
            problem: FieldProblem::Invalid {
                value: value.into(),
                reason: reason.into(),
            },
        }
    }
}

/// Why a single document failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] EnvelopeError),

    #[error("field extraction error: {0}")]
    FieldExtraction(#[from] ExtractionError),
}

impl DocumentError {
    /// Stable identifier of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::Decode(_) => "decode_error",
            DocumentError::MalformedEnvelope(_) => "malformed_envelope",
            DocumentError::FieldExtraction(_) => "field_extraction_error",
        }
    }

    /// The offending field, for extraction failures.
    pub fn field(&self) -> Option<Field> {
        match self {
            DocumentError::FieldExtraction(e) => Some(e.field),
            _ => None,
        }
    }
}

/// A document failure tagged with the document it came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_name}: {error}")]
pub struct DocumentFailure {
    pub source_name: String,
    pub error: DocumentError,
}

/// Errors that end a batch without a report.
#[derive(Error, Debug)]
pub enum BatchError {
    /// A document failed under the fail-fast policy.
    #[error("batch aborted at {}: {}", .0.source_name, .0.error)]
    Aborted(DocumentFailure),

    /// Adding a document would overflow the batch sums.
    #[error("batch totals overflow when adding {source_name}")]
    TotalsOverflow { source_name: String },
}

impl BatchError {
    /// The failing document, when the batch was aborted by one.
    pub fn failure(&self) -> Option<&DocumentFailure> {
        match self {
            BatchError::Aborted(failure) => Some(failure),
            BatchError::TotalsOverflow { .. } => None,
        }
    }
}

/// Errors raised while persisting or locating report artifacts.
#[derive(Error, Debug)]
pub enum ReportIoError {
    /// The named artifact does not exist.
    #[error("report artifact not found: {0}")]
    NotFound(String),

    /// The name does not follow the artifact naming convention.
    #[error("invalid report artifact name: {0:?}")]
    InvalidName(String),

    /// Writing or reading the artifact failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The spreadsheet writer failed.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    /// The PDF writer failed.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// The JSON sidecar could not be (de)serialized.
    #[error("report serialization error: {0}")]
    Serialize(String),
}

impl ReportIoError {
    /// Whether the caller should see this as a not-found condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            ReportIoError::NotFound(_) | ReportIoError::InvalidName(_) => true,
            ReportIoError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors from the narrative summarizer backend.
#[derive(Error, Debug)]
pub enum SummaryError {
    /// The backend is not configured (e.g. missing API key).
    #[error("summarizer not configured: {0}")]
    NotConfigured(String),

    /// The request failed or timed out.
    #[error("summarizer request failed: {0}")]
    Request(String),

    /// The backend answered without usable text.
    #[error("summarizer returned an empty response")]
    EmptyResponse,

    /// An issuer's totals do not fit a `Decimal`.
    #[error("totals overflow for issuer {0}")]
    Overflow(String),
}

/// Result type for the nfex library.
pub type Result<T> = std::result::Result<T, NfexError>;
