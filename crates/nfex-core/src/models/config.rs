//! Configuration structures for the report pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::batch::FailurePolicy;

/// Main configuration for nfex.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NfexConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Batch aggregation configuration.
    pub batch: BatchConfig,

    /// Report output configuration.
    pub report: ReportConfig,

    /// Narrative summary backend configuration.
    pub summary: SummaryConfig,

    /// HTTP server configuration.
    pub server: ServerConfig,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Reject issuers whose CNPJ/CPF check digits do not match.
    pub validate_issuer_id: bool,

    /// Accept `emit.CPF` when `emit.CNPJ` is absent.
    pub accept_cpf_issuer: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            validate_issuer_id: false,
            accept_cpf_issuer: true,
        }
    }
}

/// Batch aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// What to do when a single document fails.
    pub failure_policy: FailurePolicy,

    /// Maximum number of documents parsed concurrently.
    pub jobs: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::FailFast,
            jobs: 1,
        }
    }
}

/// Report output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory where report artifacts are written.
    pub output_dir: PathBuf,

    /// Maximum number of records in the printable rendering.
    pub print_cap: usize,

    /// Also write a CSV copy of every report.
    pub write_csv: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            print_cap: 30,
            write_csv: false,
        }
    }
}

/// Narrative summary backend (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Base URL of the chat completions API.
    pub api_base_url: String,

    /// Model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.3,
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,

    /// Deadline for a whole batch request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            request_timeout_secs: 120,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

impl NfexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
