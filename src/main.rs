// src/main.rs
// =============================================================================
// Entry point of the docs2pdf CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (RUST_LOG wins over -v / -q)
// 3. Run the crawl-and-convert pipeline with headless Chromium
// 4. Print the run report and exit with the proper code
//
// Exit codes: 0 = merged PDF written, 1 = crawl ran but the merge failed,
// 2 = fatal error (bad arguments, output directory, browser startup)
// =============================================================================

mod cli;
mod config;
mod crawl;
mod error;
mod output;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::PipelineConfig;
use crawl::Pipeline;
use render::ChromiumRenderer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr so stdout stays clean for the report (and --json)
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config = PipelineConfig::from_cli(&cli)?;
    let renderer = ChromiumRenderer::new(config.chromium.clone());

    let report = Pipeline::new(config, renderer)
        .run()
        .await
        .context("crawl could not start")?;
    output::print_report(&report, cli.json).context("failed to print the run report")?;

    if report.merge_succeeded() {
        Ok(0)
    } else {
        Ok(1)
    }
}
