//! Batch command - aggregate many NF-e files into a report.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use nfex_core::batch::FailurePolicy;
use nfex_core::models::RawDocument;
use nfex_core::report::printable::{layout_table, render_pdf};
use nfex_core::report::PrintOptions;
use nfex_core::summary::summarize;
use nfex_core::Pipeline;

use crate::summarizer::ChatCompletionsClient;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern (e.g. "notas/*.xml")
    #[arg(required = true)]
    input: String,

    /// Directory for the report artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Skip failing documents instead of aborting the batch
    #[arg(long)]
    continue_on_error: bool,

    /// Also write a CSV copy of the report
    #[arg(long)]
    csv: bool,

    /// Also render the printable PDF
    #[arg(long)]
    pdf: bool,

    /// Also print a narrative summary (needs the summary API key)
    #[arg(long)]
    summary: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = super::load_config(config_path)?;

    if let Some(output_dir) = &args.output_dir {
        config.report.output_dir = output_dir.clone();
    }
    if let Some(jobs) = args.jobs {
        config.batch.jobs = jobs;
    }
    if args.continue_on_error {
        config.batch.failure_policy = FailurePolicy::Isolate;
    }
    if args.csv {
        config.report.write_csv = true;
    }

    // Build the summarizer first so a missing key fails before any work
    let summarizer = if args.summary {
        Some(ChatCompletionsClient::from_config(&config.summary)?)
    } else {
        None
    };

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        documents.push(RawDocument::from_path(path)?);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let pipeline = Pipeline::from_config(&config);
    let run = pipeline.run(&documents)?;

    for failure in &run.response.failures {
        warn!("Skipped {}: {}", failure.source_name, failure.message);
        eprintln!(
            "{} Skipped {}: {}",
            style("⚠").yellow(),
            failure.source_name,
            failure.message
        );
    }

    println!("{}", serde_json::to_string_pretty(&run.response)?);

    eprintln!(
        "{} Report written to {}",
        style("✓").green(),
        pipeline.store().dir().join(&run.saved.spreadsheet).display()
    );
    if let Some(csv) = &run.saved.csv {
        debug!("CSV written to {}", csv);
    }

    if args.pdf {
        let options = PrintOptions::new(&run.saved.spreadsheet).with_cap(config.report.print_cap);
        let pdf = render_pdf(&layout_table(&run.table, &options))?;
        let pdf_name = pipeline.store().save_pdf(&run.saved.spreadsheet, &pdf)?;
        eprintln!(
            "{} PDF written to {}",
            style("✓").green(),
            pipeline.store().dir().join(pdf_name).display()
        );
    }

    if let Some(summarizer) = summarizer {
        let text = summarize(&summarizer, &run.table).await?;
        eprintln!();
        eprintln!("{}", style("Resumo").bold());
        eprintln!("{}", text);
    }

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        files.len(),
        start.elapsed()
    );
    eprintln!(
        "  {} included, {} skipped",
        style(run.response.count).green(),
        style(run.response.failures.len()).red()
    );

    Ok(())
}
