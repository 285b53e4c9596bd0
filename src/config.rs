// src/config.rs
// =============================================================================
// Validated pipeline settings.
//
// The CLI (src/cli.rs) is parsed by clap; this module turns it into a
// PipelineConfig and rejects combinations clap cannot check on its own.
// Tests build PipelineConfig directly from Default.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::cli::Cli;
use crate::render::{ChromiumOptions, WaitPolicy};

pub const DEFAULT_OUT_DIR: &str = "output";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_FINAL_NAME: &str = "final.pdf";
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL exactly as given; normalized by the driver
    pub seed: String,
    pub out_dir: PathBuf,
    /// Number of workers, and of renderer handles in the pool
    pub workers: usize,
    pub wait: WaitPolicy,
    /// How long the queue must stay idle before the crawl is declared done
    pub quiescence: Duration,
    /// File name of the merged document inside `out_dir`
    pub final_name: String,
    pub chromium: ChromiumOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: String::new(),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            workers: DEFAULT_WORKERS,
            wait: WaitPolicy::default(),
            quiescence: DEFAULT_QUIESCENCE,
            final_name: DEFAULT_FINAL_NAME.to_string(),
            chromium: ChromiumOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.workers == 0 {
            bail!("--workers must be at least 1");
        }
        if cli.timeout == 0 {
            bail!("--timeout must be at least 1 second");
        }
        if cli.final_name.contains(['/', '\\']) || !cli.final_name.ends_with(".pdf") {
            bail!(
                "--final-name must be a plain file name ending in .pdf, got '{}'",
                cli.final_name
            );
        }

        let timeout = Duration::from_secs(cli.timeout);
        Ok(Self {
            seed: cli.url.clone(),
            out_dir: cli.out.clone(),
            workers: cli.workers,
            wait: WaitPolicy {
                timeout,
                settle: Duration::from_millis(cli.settle_ms),
            },
            quiescence: DEFAULT_QUIESCENCE,
            final_name: cli.final_name.clone(),
            chromium: ChromiumOptions {
                executable: cli.chrome.clone(),
                no_sandbox: cli.no_sandbox,
                request_timeout: timeout,
            },
        })
    }
}
