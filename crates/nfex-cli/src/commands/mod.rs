//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod pdf;
pub mod process;
pub mod serve;
pub mod summarize;

use std::path::{Path, PathBuf};

use tracing::debug;

use nfex_core::models::NfexConfig;
use nfex_core::report::ReportStore;

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nfex")
        .join("config.json")
}

/// Load the configuration from `--config`, else from the default location
/// when it exists, else use the defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<NfexConfig> {
    if let Some(path) = config_path {
        return Ok(NfexConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Loading configuration from {}", default_path.display());
        return Ok(NfexConfig::from_file(&default_path)?);
    }

    Ok(NfexConfig::default())
}

/// Split a report argument into the store holding it and its file name.
///
/// `report` may be a bare artifact name (looked up in `dir`, or the
/// configured output directory) or a path to one.
pub fn locate_report(
    report: &str,
    dir: Option<&Path>,
    config: &NfexConfig,
) -> anyhow::Result<(ReportStore, String)> {
    let path = Path::new(report);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid report name: {}", report))?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let store_dir = match (parent, dir) {
        (Some(parent), _) => parent.to_path_buf(),
        (None, Some(dir)) => dir.to_path_buf(),
        (None, None) => config.report.output_dir.clone(),
    };

    Ok((ReportStore::new(store_dir), name.to_string()))
}
