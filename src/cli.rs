// src/cli.rs
// =============================================================================
// Command-line interface, parsed with clap's derive API.
//
// Every flag can also come from an environment variable, which is handy in
// CI and containers (e.g. CHROMIUM_PATH for the browser binary).
//
// A missing --url is a usage error: clap prints the help text and exits with
// a non-zero code before the pipeline starts.
// =============================================================================

use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_FINAL_NAME, DEFAULT_OUT_DIR, DEFAULT_WORKERS};

#[derive(Parser, Debug)]
#[command(
    name = "docs2pdf",
    version,
    about = "Crawl a documentation site and merge every page into one PDF",
    long_about = "docs2pdf crawls every page of a documentation site reachable from the base URL \
                  (same host only), renders each page with headless Chromium, converts the \
                  snapshots to PDF and merges them, in file-name order, into a single document."
)]
pub struct Cli {
    /// Base URL of the documentation site (e.g. https://docs.example.com)
    #[arg(long, env = "DOCS2PDF_URL")]
    pub url: String,

    /// Output directory for page snapshots, page PDFs and the merged PDF.
    /// Every page PDF in it is merged, including ones left by earlier runs;
    /// use a fresh directory for a clean document
    #[arg(long, env = "DOCS2PDF_OUT", default_value = DEFAULT_OUT_DIR)]
    pub out: PathBuf,

    /// Number of concurrent workers and browser instances
    #[arg(long, env = "DOCS2PDF_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Timeout in seconds for loading a page or exporting a PDF
    #[arg(long, env = "DOCS2PDF_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Quiet period in milliseconds after the load event before snapshotting
    #[arg(long, env = "DOCS2PDF_SETTLE_MS", default_value_t = 500)]
    pub settle_ms: u64,

    /// File name of the merged PDF inside the output directory
    #[arg(long, env = "DOCS2PDF_FINAL_NAME", default_value = DEFAULT_FINAL_NAME)]
    pub final_name: String,

    /// Path to the Chrome/Chromium executable
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chrome: Option<PathBuf>,

    /// Launch the browser with --no-sandbox (needed in most containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Print the run report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Default log filter for the selected verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "docs2pdf=debug"
        } else if self.quiet {
            "docs2pdf=warn"
        } else {
            "docs2pdf=info"
        }
    }
}
