//! CLI application for NF-e batch reports.

mod commands;
mod server;
mod summarizer;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{batch, config, pdf, process, serve, summarize};

/// NF-e reports - Aggregate Brazilian electronic invoices into spreadsheet reports
#[derive(Parser)]
#[command(name = "nfex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the record of a single NF-e XML file
    Process(process::ProcessArgs),

    /// Aggregate many NF-e XML files into a report
    Batch(batch::BatchArgs),

    /// Write a narrative summary of a saved report
    Summarize(summarize::SummarizeArgs),

    /// Render a saved report as a printable PDF
    Pdf(pdf::PdfArgs),

    /// Serve the pipeline over HTTP
    Serve(serve::ServeArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG overrides it
    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Execute command
    match cli.command {
        Commands::Process(args) => process::run(args, cli.config.as_deref()).await,
        Commands::Batch(args) => batch::run(args, cli.config.as_deref()).await,
        Commands::Summarize(args) => summarize::run(args, cli.config.as_deref()).await,
        Commands::Pdf(args) => pdf::run(args, cli.config.as_deref()).await,
        Commands::Serve(args) => serve::run(args, cli.config.as_deref()).await,
        Commands::Config(args) => config::run(args, cli.config.as_deref()).await,
    }
}
