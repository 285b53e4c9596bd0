// src/output/report.rs
// =============================================================================
// Run report: what the crawl did and how the merge went.
//
// Workers record every task outcome into CrawlStats while the crawl runs.
// At the end the driver freezes it into a CrawlReport, which main.rs prints
// either as a table or as JSON (--json).
// =============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use super::merge::MergeSummary;
use crate::crawl::{Task, TaskKind, TaskOutcome};

/// A page that did not make it into the final document.
#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    pub url: String,
    pub phase: TaskKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct CrawlStats {
    downloaded: AtomicUsize,
    converted: AtomicUsize,
    discarded: AtomicUsize,
    failures: Mutex<Vec<PageFailure>>,
}

impl CrawlStats {
    pub fn record(&self, task: &Task, outcome: &TaskOutcome) {
        match (task.kind(), outcome) {
            (_, TaskOutcome::Discarded) => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
            }
            (TaskKind::Download, TaskOutcome::Succeeded { .. }) => {
                self.downloaded.fetch_add(1, Ordering::Relaxed);
            }
            (TaskKind::Convert, TaskOutcome::Succeeded { .. }) => {
                self.converted.fetch_add(1, Ordering::Relaxed);
            }
            (phase, TaskOutcome::Failed(error)) => {
                self.failures.lock().push(PageFailure {
                    url: task.url().to_string(),
                    phase,
                    message: error.to_string(),
                });
            }
        }
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn converted(&self) -> usize {
        self.converted.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> Vec<PageFailure> {
        let mut failures = self.failures.lock().clone();
        failures.sort_by(|a, b| a.url.cmp(&b.url));
        failures
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub seed: String,
    pub pages_downloaded: usize,
    pub pages_converted: usize,
    pub duplicates_discarded: usize,
    pub failures: Vec<PageFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<MergeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_error: Option<String>,
}

impl CrawlReport {
    pub fn from_stats(seed: &str, stats: &CrawlStats) -> Self {
        Self {
            seed: seed.to_string(),
            pages_downloaded: stats.downloaded(),
            pages_converted: stats.converted(),
            duplicates_discarded: stats.discarded(),
            failures: stats.failures(),
            merged: None,
            merge_error: None,
        }
    }

    pub fn merge_succeeded(&self) -> bool {
        self.merged.is_some()
    }
}

/// Prints the report either as a table or as JSON.
pub fn print_report(report: &CrawlReport, json: bool) -> serde_json::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_table(report);
    }
    Ok(())
}

fn print_table(report: &CrawlReport) {
    if !report.failures.is_empty() {
        println!("{:<60} {:<10} {:<40}", "URL", "PHASE", "ERROR");
        println!("{}", "=".repeat(110));
        for failure in &report.failures {
            // Truncate URL if too long for display
            let url_display = if failure.url.chars().count() > 57 {
                format!("{}...", failure.url.chars().take(57).collect::<String>())
            } else {
                failure.url.clone()
            };
            println!(
                "{:<60} {:<10} {:<40}",
                url_display,
                failure.phase.to_string(),
                failure.message
            );
        }
        println!();
    }

    println!("📊 Summary for {}", report.seed);
    println!("   📥 Downloaded: {}", report.pages_downloaded);
    println!("   📄 Converted: {}", report.pages_converted);
    println!("   🔁 Duplicates skipped: {}", report.duplicates_discarded);
    println!("   ❌ Failed: {}", report.failures.len());

    match (&report.merged, &report.merge_error) {
        (Some(merged), _) => println!(
            "   ✅ Merged {} page(s) from {} file(s) into {}",
            merged.pages,
            merged.inputs,
            merged.output.display()
        ),
        (None, Some(error)) => println!("   ⚠️  Merge failed: {error}"),
        (None, None) => {}
    }
}
