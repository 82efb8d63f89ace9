//! Core library for NF-e batch ingestion.
//!
//! This crate provides:
//! - XML decoding into a generic key/value tree
//! - NF-e envelope normalization (`nfeProc`, bare `NFe`, prefixed `*NFe`)
//! - Issuer and ICMS totals extraction with exact decimal amounts
//! - Batch aggregation with fail-fast or isolated failures
//! - Report outputs: sorted table, xlsx/CSV workbook, printable PDF
//! - A configured end-to-end pipeline writing the report artifacts
//! - Prompt building for narrative summaries behind a pluggable backend

pub mod batch;
pub mod error;
pub mod invoice;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod summary;
pub mod xml;

pub use batch::{BatchAggregator, BatchOptions, BatchOutcome, BatchTotals, FailurePolicy};
pub use error::{
    BatchError, DecodeError, DocumentError, DocumentFailure, EnvelopeError, ExtractionError,
    Field, NfexError, ReportIoError, Result, SummaryError,
};
pub use invoice::{InvoiceParser, NfeParser};
pub use models::{InvoiceRecord, NfexConfig, RawDocument};
pub use pipeline::{Pipeline, PipelineRun};
pub use report::{BatchResponse, FailureReport, ReportStore, ReportTable};
pub use summary::{NarrativeSummarizer, SummaryPrompt};
pub use xml::{parse_document, XmlValue};
