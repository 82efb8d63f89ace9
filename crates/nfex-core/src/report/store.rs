//! Report artifacts on disk.
//!
//! Every batch writes `relatorio_nfes_<unix-millis>.xlsx` plus a JSON
//! sidecar holding the same table, so later operations (summary, PDF)
//! can reload it without reading the workbook back. Names handed in by
//! callers are checked against the naming convention before any path is
//! built from them.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{sheet, ReportTable};
use crate::error::ReportIoError;
use crate::models::InvoiceRecord;

/// File name prefix of every artifact.
pub const ARTIFACT_PREFIX: &str = "relatorio_nfes_";

lazy_static! {
    static ref ARTIFACT_NAME: Regex =
        Regex::new(r"^relatorio_nfes_(\d+)\.(xlsx|json|pdf|csv)$").unwrap();
}

/// Artifact kinds, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Spreadsheet,
    Table,
    Pdf,
    Csv,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Spreadsheet => "xlsx",
            ArtifactKind::Table => "json",
            ArtifactKind::Pdf => "pdf",
            ArtifactKind::Csv => "csv",
        }
    }

    /// MIME type used when serving the artifact.
    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ArtifactKind::Table => "application/json",
            ArtifactKind::Pdf => "application/pdf",
            ArtifactKind::Csv => "text/csv",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "xlsx" => Some(ArtifactKind::Spreadsheet),
            "json" => Some(ArtifactKind::Table),
            "pdf" => Some(ArtifactKind::Pdf),
            "csv" => Some(ArtifactKind::Csv),
            _ => None,
        }
    }
}

/// A validated artifact name, split into its stem and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    stem: String,
    kind: ArtifactKind,
}

impl ArtifactName {
    /// Validate a caller-supplied file name.
    pub fn parse(name: &str) -> Result<Self, ReportIoError> {
        let invalid = || ReportIoError::InvalidName(name.to_string());
        let captures = ARTIFACT_NAME.captures(name).ok_or_else(invalid)?;
        let kind = ArtifactKind::from_extension(&captures[2]).ok_or_else(invalid)?;
        Ok(Self {
            stem: format!("{ARTIFACT_PREFIX}{}", &captures[1]),
            kind,
        })
    }

    fn new(stamp: i64, kind: ArtifactKind) -> Self {
        Self {
            stem: format!("{ARTIFACT_PREFIX}{stamp}"),
            kind,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The same report, another artifact kind.
    pub fn with_kind(&self, kind: ArtifactKind) -> Self {
        Self {
            stem: self.stem.clone(),
            kind,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem, self.kind.extension())
    }
}

/// Names of the artifacts written for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedReport {
    /// The workbook; this is the report's reference.
    pub spreadsheet: String,

    /// JSON sidecar with the table rows.
    pub table: String,

    /// CSV export, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct StoredTable {
    rows: Vec<InvoiceRecord>,
}

/// Directory holding the report artifacts.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportIoError + '_ {
        move |source| ReportIoError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Persist the workbook and its sidecar (and optionally a CSV export).
    ///
    /// The workbook file is created exclusively; when a report with the
    /// same timestamp already exists the timestamp is bumped, so two
    /// batches never overwrite each other. If any artifact fails to
    /// write, the ones already written are removed again.
    pub fn save(&self, table: &ReportTable, with_csv: bool) -> Result<SavedReport, ReportIoError> {
        self.save_at(chrono::Utc::now().timestamp_millis(), table, with_csv)
    }

    fn save_at(&self, stamp: i64, table: &ReportTable, with_csv: bool) -> Result<SavedReport, ReportIoError> {
        std::fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;

        let workbook = sheet::to_xlsx(table)?;
        let name = self.create_exclusive(stamp, &workbook)?;

        let saved = match self.write_companions(&name, table, with_csv) {
            Ok(saved) => saved,
            Err(e) => {
                self.remove_report(&name);
                return Err(e);
            }
        };

        info!(dir = %self.dir.display(), spreadsheet = %saved.spreadsheet, rows = table.len(), "saved report");
        Ok(saved)
    }

    /// Write the sidecar and CSV next to an already created workbook.
    fn write_companions(
        &self,
        name: &ArtifactName,
        table: &ReportTable,
        with_csv: bool,
    ) -> Result<SavedReport, ReportIoError> {
        let table_name = name.with_kind(ArtifactKind::Table);
        let stored = StoredTable {
            rows: table.rows().to_vec(),
        };
        let json = serde_json::to_vec_pretty(&stored)
            .map_err(|e| ReportIoError::Serialize(e.to_string()))?;
        self.write(&table_name, &json)?;

        let csv = if with_csv {
            let csv_name = name.with_kind(ArtifactKind::Csv);
            self.write(&csv_name, &sheet::to_csv(table)?)?;
            Some(csv_name.file_name())
        } else {
            None
        };

        Ok(SavedReport {
            spreadsheet: name.file_name(),
            table: table_name.file_name(),
            csv,
        })
    }

    /// Best-effort removal of a partially written report.
    fn remove_report(&self, name: &ArtifactName) {
        for kind in [ArtifactKind::Spreadsheet, ArtifactKind::Table, ArtifactKind::Csv] {
            let path = self.dir.join(name.with_kind(kind).file_name());
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed partial report artifact"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "could not remove partial report artifact: {}", e),
            }
        }
    }

    fn create_exclusive(&self, mut stamp: i64, bytes: &[u8]) -> Result<ArtifactName, ReportIoError> {
        loop {
            let name = ArtifactName::new(stamp, ArtifactKind::Spreadsheet);
            let path = self.dir.join(name.file_name());
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes).map_err(Self::io_error(&path))?;
                    return Ok(name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "report name taken, bumping timestamp");
                    stamp += 1;
                }
                Err(e) => return Err(Self::io_error(&path)(e)),
            }
        }
    }

    fn write(&self, name: &ArtifactName, bytes: &[u8]) -> Result<PathBuf, ReportIoError> {
        let path = self.dir.join(name.file_name());
        std::fs::write(&path, bytes).map_err(Self::io_error(&path))?;
        Ok(path)
    }

    /// Path of an existing artifact.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ReportIoError> {
        let name = ArtifactName::parse(name)?;
        let path = self.dir.join(name.file_name());
        if !path.is_file() {
            return Err(ReportIoError::NotFound(name.file_name()));
        }
        Ok(path)
    }

    /// Contents and kind of an existing artifact.
    pub fn read(&self, name: &str) -> Result<(Vec<u8>, ArtifactKind), ReportIoError> {
        let kind = ArtifactName::parse(name)?.kind();
        let path = self.resolve(name)?;
        let bytes = std::fs::read(&path).map_err(Self::io_error(&path))?;
        Ok((bytes, kind))
    }

    /// Reload the table of a report, given the name of any of its artifacts.
    pub fn load_table(&self, name: &str) -> Result<ReportTable, ReportIoError> {
        let sidecar = ArtifactName::parse(name)?.with_kind(ArtifactKind::Table);
        let path = self.resolve(&sidecar.file_name())?;
        let json = std::fs::read(&path).map_err(Self::io_error(&path))?;

        let stored: StoredTable = serde_json::from_slice(&json)
            .map_err(|e| ReportIoError::Serialize(format!("{}: {e}", path.display())))?;
        ReportTable::from_rows(stored.rows).ok_or_else(|| {
            ReportIoError::Serialize(format!("{}: last row is not the aggregate row", path.display()))
        })
    }

    /// Store the PDF rendering of a report next to its workbook.
    pub fn save_pdf(&self, name: &str, pdf: &[u8]) -> Result<String, ReportIoError> {
        let pdf_name = ArtifactName::parse(name)?.with_kind(ArtifactKind::Pdf);
        self.write(&pdf_name, pdf)?;
        Ok(pdf_name.file_name())
    }
}
