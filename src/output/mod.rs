// src/output/mod.rs
// =============================================================================
// Everything the pipeline leaves on disk or prints.
//
// Submodules:
// - artifact: deterministic per-page file paths and writing them
// - merge: the final PDF merge over all per-page PDFs
// - report: run statistics and the end-of-run summary
// - snapshot: anchors stored HTML to its page with <base href>
// =============================================================================

mod artifact;
mod merge;
mod report;
mod snapshot;

pub use artifact::{artifact_path, persist};
pub use merge::{MergeStage, PDF_EXTENSION};
pub use report::{print_report, CrawlReport, CrawlStats};
pub use snapshot::anchor_snapshot;

pub const HTML_EXTENSION: &str = "html";
