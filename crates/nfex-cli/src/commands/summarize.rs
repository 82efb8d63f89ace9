//! Summarize command - narrative summary of a saved report.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use nfex_core::summary::{summarize, SummaryPrompt};

use crate::summarizer::ChatCompletionsClient;

/// Arguments for the summarize command.
#[derive(Args)]
pub struct SummarizeArgs {
    /// Report name or path (e.g. relatorio_nfes_1700000000000.xlsx)
    #[arg(required = true)]
    report: String,

    /// Directory holding the report (default: configured output directory)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Print the prompt instead of calling the summary API
    #[arg(long)]
    dry_run: bool,
}

pub async fn run(args: SummarizeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let (store, name) = super::locate_report(&args.report, args.dir.as_deref(), &config)?;
    let table = store.load_table(&name)?;

    info!("Loaded {} rows from {}", table.len(), name);

    if args.dry_run {
        let prompt = SummaryPrompt::from_table(&table)?;
        println!("{}\n\n{}", prompt.system, prompt.user);
        return Ok(());
    }

    let client = ChatCompletionsClient::from_config(&config.summary)?;
    let text = summarize(&client, &table).await?;
    println!("{}", text);

    Ok(())
}
