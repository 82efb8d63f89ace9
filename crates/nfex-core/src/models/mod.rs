//! Data models shared across the pipeline.

pub mod config;
pub mod record;

pub use config::NfexConfig;
pub use record::{InvoiceRecord, RawDocument, AGGREGATE_SOURCE_NAME};
