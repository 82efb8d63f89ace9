//! PDF command - printable rendering of a saved report.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use nfex_core::report::printable::{layout_table, render_pdf};
use nfex_core::report::PrintOptions;

/// Arguments for the pdf command.
#[derive(Args)]
pub struct PdfArgs {
    /// Report name or path (e.g. relatorio_nfes_1700000000000.xlsx)
    #[arg(required = true)]
    report: String,

    /// Directory holding the report (default: configured output directory)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Output file (default: next to the report)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum number of records printed
    #[arg(long)]
    cap: Option<usize>,

    /// Title line (default: "Relatório de NF-e")
    #[arg(long)]
    title: Option<String>,
}

pub async fn run(args: PdfArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let (store, name) = super::locate_report(&args.report, args.dir.as_deref(), &config)?;
    let table = store.load_table(&name)?;

    let mut options = PrintOptions::new(&name).with_cap(args.cap.unwrap_or(config.report.print_cap));
    if let Some(title) = args.title {
        options = options.with_title(title);
    }
    let layout = layout_table(&table, &options);
    let pdf = render_pdf(&layout)?;

    info!(
        "Rendered {} of {} records on {} page(s)",
        layout.printed,
        table.len(),
        layout.pages.len()
    );

    let written = match &args.output {
        Some(path) => {
            fs::write(path, &pdf)?;
            path.clone()
        }
        None => store.dir().join(store.save_pdf(&name, &pdf)?),
    };

    if layout.omitted > 0 {
        eprintln!(
            "{} {} record(s) left out of the printable report",
            style("ℹ").blue(),
            layout.omitted
        );
    }
    eprintln!("{} PDF written to {}", style("✓").green(), written.display());

    Ok(())
}
