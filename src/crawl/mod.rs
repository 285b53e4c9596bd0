// src/crawl/mod.rs
// =============================================================================
// The crawl: a shared task queue drained by N workers.
//
// Submodules:
// - task: what a worker can be asked to do, and how it ended
// - queue: the shared FIFO with in-flight accounting and idle detection
// - frontier: URL canonicalization, the same-host scope and claimed URLs
// - links: outbound link extraction from a rendered page
// - worker: executes download and convert tasks
// - driver: wires it all together and runs the merge at the end
//
// Every URL is downloaded at most once: the claim happens in the frontier
// when a worker picks up a Download task, not when the link is discovered.
// =============================================================================

mod driver;
mod frontier;
mod links;
mod queue;
mod task;
mod worker;

pub use driver::Pipeline;
pub use frontier::canonicalize;
pub use task::{Task, TaskKind, TaskOutcome};
