//! Serve command - HTTP adapter over the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::warn;

use crate::server::{self, AppState};
use crate::summarizer::ChatCompletionsClient;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (default: server.bind from the config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory for the report artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(output_dir) = args.output_dir {
        config.report.output_dir = output_dir;
    }
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let mut state = AppState::new(&config);
    match ChatCompletionsClient::from_config(&config.summary) {
        Ok(client) => state = state.with_summarizer(Arc::new(client)),
        Err(e) => warn!("Narrative summaries disabled: {}", e),
    }

    eprintln!(
        "{} Serving on http://{} (reports in {})",
        style("ℹ").blue(),
        bind,
        config.report.output_dir.display()
    );

    server::serve(state, &bind).await
}
