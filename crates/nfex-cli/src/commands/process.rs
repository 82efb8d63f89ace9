//! Process command - extract the record of a single NF-e file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::info;

use nfex_core::error::DocumentFailure;
use nfex_core::invoice::rules::{format_brl_amount, format_issuer_id};
use nfex_core::invoice::{InvoiceParser, NfeParser};
use nfex_core::models::{InvoiceRecord, RawDocument};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input XML file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Reject issuers whose CNPJ/CPF check digits do not match
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = super::load_config(config_path)?;
    if args.validate {
        config.extraction.validate_issuer_id = true;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let document = RawDocument::from_path(&args.input)?;
    let record = NfeParser::from_config(&config.extraction)
        .parse(&document)
        .map_err(|error| DocumentFailure {
            source_name: document.name.clone(),
            error,
        })?;

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    info!("Processed {} in {:?}", document.name, start.elapsed());

    Ok(())
}

fn format_record(record: &InvoiceRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &InvoiceRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "source_name",
        "issuer_id",
        "issuer_name",
        "invoice_total",
        "tax_total",
    ])?;

    wtr.write_record([
        &record.source_name,
        &record.issuer_id,
        &record.issuer_name,
        &record.invoice_total.to_string(),
        &record.tax_total.to_string(),
    ])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &InvoiceRecord) -> String {
    let mut output = String::new();

    output.push_str(&format!("File: {}\n", record.source_name));
    output.push('\n');

    output.push_str("Issuer:\n");
    output.push_str(&format!("  {}\n", record.issuer_name));
    output.push_str(&format!("  {}\n", format_issuer_id(&record.issuer_id)));
    output.push('\n');

    output.push_str("Totals:\n");
    output.push_str(&format!("  Invoice: R$ {}\n", format_brl_amount(record.invoice_total)));
    output.push_str(&format!("  ICMS:    R$ {}\n", format_brl_amount(record.tax_total)));

    output
}
