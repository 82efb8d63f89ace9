//! End-to-end batch run: aggregate, build the table, persist the artifacts.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::batch::{BatchAggregator, BatchOptions};
use crate::error::{NfexError, Result};
use crate::invoice::NfeParser;
use crate::models::{NfexConfig, RawDocument};
use crate::report::{BatchResponse, ReportStore, ReportTable, SavedReport};

/// Everything a finished batch produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub response: BatchResponse,
    pub table: ReportTable,
    pub saved: SavedReport,
}

/// Configured batch pipeline.
pub struct Pipeline {
    aggregator: BatchAggregator<NfeParser>,
    store: ReportStore,
    write_csv: bool,
}

impl Pipeline {
    /// Build the pipeline described by `config`.
    pub fn from_config(config: &NfexConfig) -> Self {
        Self {
            aggregator: BatchAggregator::new(NfeParser::from_config(&config.extraction))
                .with_options(BatchOptions::from(&config.batch)),
            store: ReportStore::new(&config.report.output_dir),
            write_csv: config.report.write_csv,
        }
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Run a batch. Nothing is written unless the whole batch succeeds.
    pub fn run(&self, documents: &[RawDocument]) -> Result<PipelineRun> {
        self.run_cancellable(documents, &AtomicBool::new(false))
    }

    /// Like [`Pipeline::run`], but gives up without writing anything when
    /// `cancel` is set before the artifacts are saved.
    pub fn run_cancellable(&self, documents: &[RawDocument], cancel: &AtomicBool) -> Result<PipelineRun> {
        let outcome = self.aggregator.aggregate(documents)?;
        let table = ReportTable::from_outcome(&outcome);

        if cancel.load(Ordering::Acquire) {
            warn!(documents = documents.len(), "batch cancelled before saving");
            return Err(NfexError::Cancelled);
        }

        let saved = self.store.save(&table, self.write_csv)?;

        info!(
            documents = documents.len(),
            records = outcome.records.len(),
            failures = outcome.failures.len(),
            report = %saved.spreadsheet,
            "pipeline finished"
        );

        Ok(PipelineRun {
            response: BatchResponse::new(&outcome, saved.spreadsheet.clone()),
            table,
            saved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FailurePolicy;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn nfe(name: &str, issuer: &str, total: &str, icms: &str) -> RawDocument {
        RawDocument::new(
            name,
            format!(
                "<NFe><infNFe><emit><CNPJ>11222333000181</CNPJ><xNome>{issuer}</xNome></emit>\
                 <total><ICMSTot><vNF>{total}</vNF><vICMS>{icms}</vICMS></ICMSTot></total></infNFe></NFe>"
            ),
        )
    }

    fn config(dir: &TempDir) -> NfexConfig {
        let mut config = NfexConfig::default();
        config.report.output_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_run_writes_report() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::from_config(&config(&dir));

        let run = pipeline
            .run(&[
                nfe("beta.xml", "Beta", "50.00", "9.00"),
                nfe("acme.xml", "Acme", "100.00", "18.00"),
            ])
            .unwrap();

        assert_eq!(run.response.count, 2);
        assert_eq!(run.response.invoice_sum.to_string(), "150.00");
        assert_eq!(run.response.table_file_reference, run.saved.spreadsheet);
        assert_eq!(run.response.records[0].source_name, "beta.xml");
        assert_eq!(run.table.rows()[0].source_name, "acme.xml");
        assert_eq!(pipeline.store().load_table(&run.saved.spreadsheet).unwrap(), run.table);
    }

    #[test]
    fn test_failed_batch_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::from_config(&config(&dir));

        let err = pipeline
            .run(&[nfe("a.xml", "Acme", "1", "0"), RawDocument::new("b.xml", "<NFe>")])
            .unwrap_err();

        assert!(matches!(err, NfexError::Batch(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::from_config(&config(&dir));

        let err = pipeline
            .run_cancellable(&[nfe("a.xml", "Acme", "1", "0")], &AtomicBool::new(true))
            .unwrap_err();

        assert!(matches!(err, NfexError::Cancelled));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_isolate_reports_failures() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.batch.failure_policy = FailurePolicy::Isolate;
        config.report.write_csv = true;

        let run = Pipeline::from_config(&config)
            .run(&[nfe("a.xml", "Acme", "1", "0"), RawDocument::new("b.xml", "<NFe>")])
            .unwrap();

        assert_eq!(run.response.count, 1);
        assert_eq!(run.response.failures.len(), 1);
        assert_eq!(run.response.failures[0].kind, "decode_error");
        assert!(run.saved.csv.is_some());
    }
}
