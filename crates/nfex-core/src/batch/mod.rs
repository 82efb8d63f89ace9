//! Batch aggregation: per-document parsing, failure policy and running sums.
//!
//! Documents are independent, so they may be parsed on a rayon pool of
//! `jobs` threads. Everything after parsing happens on the caller's thread
//! in input order, which keeps the outcome identical for every `jobs`
//! value:
//! - the records come out in input order;
//! - under [`FailurePolicy::FailFast`] the reported failure is the first one
//!   in input order;
//! - the sums are accumulated with checked `Decimal` addition, so an
//!   overflow is an error naming the document instead of a panic.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{BatchError, DocumentError, DocumentFailure};
use crate::invoice::{InvoiceParser, NfeParser};
use crate::models::config::BatchConfig;
use crate::models::{InvoiceRecord, RawDocument};

/// What to do when a single document fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole batch at the first failure; no report is produced.
    #[default]
    FailFast,
    /// Skip failing documents and report them next to the records.
    Isolate,
}

/// Running sums over the records of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTotals {
    pub invoice_sum: Decimal,
    pub tax_sum: Decimal,
}

impl BatchTotals {
    /// The sums with one more record, or `None` on overflow.
    pub fn checked_add(self, record: &InvoiceRecord) -> Option<BatchTotals> {
        Some(BatchTotals {
            invoice_sum: self.invoice_sum.checked_add(record.invoice_total)?,
            tax_sum: self.tax_sum.checked_add(record.tax_total)?,
        })
    }

    /// Sums of a record slice, or `None` on overflow.
    pub fn of(records: &[InvoiceRecord]) -> Option<BatchTotals> {
        records
            .iter()
            .try_fold(BatchTotals::default(), |totals, record| totals.checked_add(record))
    }
}

/// Result of aggregating a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Records of the documents that parsed, in input order.
    pub records: Vec<InvoiceRecord>,

    /// Sums over `records`.
    pub totals: BatchTotals,

    /// Documents skipped under [`FailurePolicy::Isolate`], in input order.
    pub failures: Vec<DocumentFailure>,
}

/// Aggregation options.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Failure handling.
    pub policy: FailurePolicy,
    /// Maximum number of documents parsed concurrently.
    pub jobs: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::FailFast,
            jobs: 1,
        }
    }
}

impl From<&BatchConfig> for BatchOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            policy: config.failure_policy,
            jobs: config.jobs.max(1),
        }
    }
}

/// Parses a batch of documents and accumulates its totals.
pub struct BatchAggregator<P = NfeParser> {
    parser: P,
    options: BatchOptions,
}

impl BatchAggregator<NfeParser> {
    /// Aggregator using the NF-e parser with default settings.
    pub fn nfe() -> Self {
        Self::new(NfeParser::new())
    }
}

impl<P: InvoiceParser + Sync> BatchAggregator<P> {
    /// Create an aggregator with default options (fail-fast, sequential).
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            options: BatchOptions::default(),
        }
    }

    /// Replace all options.
    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.options.policy = policy;
        self
    }

    /// Set the maximum number of concurrent workers.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.options.jobs = jobs.max(1);
        self
    }

    /// Parse every document and accumulate the batch.
    ///
    /// Under [`FailurePolicy::FailFast`] the first failing document (in input
    /// order) aborts the batch and no records are returned.
    pub fn aggregate(&self, documents: &[RawDocument]) -> Result<BatchOutcome, BatchError> {
        info!(
            documents = documents.len(),
            jobs = self.options.jobs,
            policy = ?self.options.policy,
            "aggregating batch"
        );

        let results = self.parse_all(documents);

        let mut outcome = BatchOutcome::default();
        for (document, result) in documents.iter().zip(results) {
            match result {
                Ok(record) => {
                    outcome.totals = outcome.totals.checked_add(&record).ok_or_else(|| {
                        error!(source = %document.name, "batch totals overflow");
                        BatchError::TotalsOverflow {
                            source_name: document.name.clone(),
                        }
                    })?;
                    outcome.records.push(record);
                }
                Err(error) => {
                    let failure = DocumentFailure {
                        source_name: document.name.clone(),
                        error,
                    };
                    match self.options.policy {
                        FailurePolicy::FailFast => {
                            error!(
                                source = %failure.source_name,
                                kind = failure.error.kind(),
                                field = failure.error.field().map(|f| f.name()),
                                "aborting batch: {}",
                                failure.error
                            );
                            return Err(BatchError::Aborted(failure));
                        }
                        FailurePolicy::Isolate => {
                            warn!(
                                source = %failure.source_name,
                                kind = failure.error.kind(),
                                field = failure.error.field().map(|f| f.name()),
                                "skipping document: {}",
                                failure.error
                            );
                            outcome.failures.push(failure);
                        }
                    }
                }
            }
        }

        info!(
            records = outcome.records.len(),
            failures = outcome.failures.len(),
            invoice_sum = %outcome.totals.invoice_sum,
            tax_sum = %outcome.totals.tax_sum,
            "batch aggregated"
        );

        Ok(outcome)
    }

    /// Parse all documents; the results line up with `documents`.
    fn parse_all(&self, documents: &[RawDocument]) -> Vec<Result<InvoiceRecord, DocumentError>> {
        let parse = |document: &RawDocument| self.parser.parse(document);
        let jobs = self.options.jobs.min(documents.len());

        if jobs <= 1 {
            return documents.iter().map(parse).collect();
        }

        match ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => {
                debug!(jobs, "parsing on worker pool");
                // Collecting an indexed parallel iterator keeps input order.
                pool.install(|| documents.par_iter().map(parse).collect())
            }
            Err(e) => {
                warn!("could not start worker pool, parsing sequentially: {}", e);
                documents.iter().map(parse).collect()
            }
        }
    }
}
