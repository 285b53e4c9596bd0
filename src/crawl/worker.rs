// src/crawl/worker.rs
// =============================================================================
// The worker loop. N identical workers share one CrawlContext.
//
// Download task:
// 1. Claim the URL in the frontier (already claimed -> discard)
// 2. Borrow a renderer handle, navigate, read the DOM, give the handle back
// 3. Anchor the snapshot to the page URL and store it
// 4. Queue a Download for every unseen same-host link, and one Convert
//
// Convert task:
// 1. Borrow a handle, print the stored snapshot to PDF, give it back
// 2. Store the PDF
//
// Failures stay inside the task: they are logged, recorded in the stats and
// the worker moves on. The handle is never held while touching the queue.
// =============================================================================

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, trace, warn};

use super::frontier::{canonicalize, CrawlScope, Frontier};
use super::links::extract_links;
use super::queue::TaskQueue;
use super::task::{Task, TaskKind, TaskOutcome, TaskState};
use crate::error::TaskError;
use crate::output::{
    anchor_snapshot, artifact_path, persist, CrawlStats, HTML_EXTENSION, PDF_EXTENSION,
};
use crate::render::{Renderer, ResourcePool, WaitPolicy};

/// State shared by the driver and every worker of one crawl.
pub struct CrawlContext<R: Renderer> {
    pub queue: TaskQueue,
    pub frontier: Frontier,
    pub pool: ResourcePool<R::Handle>,
    pub renderer: Arc<R>,
    pub scope: CrawlScope,
    pub out_dir: PathBuf,
    pub wait: WaitPolicy,
    pub stats: CrawlStats,
}

pub struct Worker<R: Renderer> {
    id: usize,
    ctx: Arc<CrawlContext<R>>,
}

impl<R: Renderer> Worker<R> {
    pub fn new(id: usize, ctx: Arc<CrawlContext<R>>) -> Self {
        Self { id, ctx }
    }

    /// Processes tasks until the queue is closed and drained.
    ///
    /// Returns the number of tasks this worker executed.
    pub async fn run(self) -> usize {
        debug!(worker = self.id, "worker started");
        let mut processed = 0;

        while let Some(lease) = self.ctx.queue.dequeue().await {
            let task = lease.task();
            let outcome = AssertUnwindSafe(self.execute(task))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    TaskOutcome::Failed(TaskError::Panicked(panic_message(panic.as_ref())))
                });
            debug_assert!(outcome.state().is_terminal());

            self.log_outcome(task, &outcome);
            self.ctx.stats.record(task, &outcome);
            processed += 1;
            // Follow-ups are queued by now; finishing the lease may make the queue idle
            drop(lease);
        }

        debug!(worker = self.id, processed, "worker stopped");
        processed
    }

    async fn execute(&self, task: &Task) -> TaskOutcome {
        let mut state = TaskState::Pending;
        if task.kind() == TaskKind::Download && !self.ctx.frontier.try_claim(task.url()) {
            self.advance(task, &mut state, TaskState::Discarded);
            return TaskOutcome::Discarded;
        }
        self.advance(task, &mut state, TaskState::Claimed);

        let outcome = match task.kind() {
            TaskKind::Download => match self.download(task).await {
                Ok(follow_ups) => TaskOutcome::Succeeded { follow_ups },
                Err(e) => TaskOutcome::Failed(e),
            },
            TaskKind::Convert => match self.convert(task).await {
                Ok(()) => TaskOutcome::Succeeded { follow_ups: 0 },
                Err(e) => TaskOutcome::Failed(e),
            },
        };
        self.advance(task, &mut state, outcome.state());
        outcome
    }

    fn advance(&self, task: &Task, state: &mut TaskState, next: TaskState) {
        debug_assert!(
            state.can_advance_to(next),
            "illegal task transition {state:?} -> {next:?}"
        );
        trace!(worker = self.id, url = task.url(), from = ?*state, to = ?next, "task state");
        *state = next;
    }

    async fn download(&self, task: &Task) -> Result<usize, TaskError> {
        let ctx = &self.ctx;
        let page_url = url::Url::parse(task.url())
            .map_err(|_| TaskError::MalformedUrl(task.url().to_string()))?;

        let html = {
            let mut handle = ctx.pool.acquire().await?;
            ctx.renderer
                .navigate(&mut *handle, page_url.as_str(), ctx.wait)
                .await?;
            ctx.renderer.content(&mut *handle).await?
        };

        let snapshot = anchor_snapshot(&String::from_utf8_lossy(&html), &page_url);
        let html_path = artifact_path(&ctx.out_dir, page_url.as_str(), HTML_EXTENSION);
        persist(&html_path, snapshot.as_bytes()).await?;

        let mut follow_ups = 0;
        for link in extract_links(&snapshot, &page_url, &ctx.scope) {
            // Only a hint; the claim at dequeue time is what counts
            if ctx.frontier.is_claimed(link.as_str()) {
                continue;
            }
            if self.enqueue(Task::download(link)) {
                follow_ups += 1;
            }
        }
        if self.enqueue(Task::convert(page_url.as_str(), html_path)) {
            follow_ups += 1;
        }

        Ok(follow_ups)
    }

    async fn convert(&self, task: &Task) -> Result<(), TaskError> {
        let ctx = &self.ctx;
        let html_path = task
            .artifact()
            .ok_or_else(|| TaskError::MissingArtifact(task.url().to_string()))?;

        let pdf = {
            let mut handle = ctx.pool.acquire().await?;
            ctx.renderer
                .export_pdf(&mut *handle, html_path, ctx.wait)
                .await?
        };

        let pdf_path = artifact_path(&ctx.out_dir, task.url(), PDF_EXTENSION);
        persist(&pdf_path, &pdf).await
    }

    fn enqueue(&self, task: Task) -> bool {
        let url = task.url().to_string();
        match self.ctx.queue.enqueue(task) {
            Ok(()) => true,
            Err(e) => {
                warn!(worker = self.id, url = %url, error = %e, "follow-up task dropped");
                false
            }
        }
    }

    fn log_outcome(&self, task: &Task, outcome: &TaskOutcome) {
        let url = canonicalize(task.url())
            .map(String::from)
            .unwrap_or_else(|| task.url().to_string());
        match outcome {
            TaskOutcome::Discarded => {
                debug!(worker = self.id, url = %url, "already claimed, discarded");
            }
            TaskOutcome::Succeeded { follow_ups } => match task.kind() {
                TaskKind::Download => {
                    info!(worker = self.id, url = %url, follow_ups, "downloaded")
                }
                TaskKind::Convert => info!(worker = self.id, url = %url, "converted"),
            },
            TaskOutcome::Failed(e) => {
                error!(worker = self.id, url = %url, phase = %task.kind(), error = %e, "task failed")
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
