// src/crawl/driver.rs
// =============================================================================
// Runs one complete crawl-and-convert job.
//
// Steps:
// 1. Normalize the seed URL and create the output directory
// 2. Start one renderer handle per worker (all or nothing)
// 3. Seed the queue and spawn the workers
// 4. Wait until the queue has stayed idle for the quiescence window
// 5. Close the queue, join the workers, close every renderer handle
// 6. Merge the per-page PDFs and build the run report
//
// Only steps 1 and 2 can fail the run. Page failures end up in the report;
// a failed merge is reported too, and the caller decides the exit code.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::frontier::{normalize_seed, CrawlScope, Frontier};
use super::queue::TaskQueue;
use super::task::Task;
use super::worker::{CrawlContext, Worker};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::{CrawlReport, CrawlStats, MergeStage};
use crate::render::{Renderer, ResourcePool};

pub struct Pipeline<R: Renderer> {
    config: PipelineConfig,
    renderer: Arc<R>,
}

impl<R: Renderer> Pipeline<R> {
    pub fn new(config: PipelineConfig, renderer: R) -> Self {
        Self {
            config,
            renderer: Arc::new(renderer),
        }
    }

    pub async fn run(&self) -> Result<CrawlReport, PipelineError> {
        let config = &self.config;
        let seed = normalize_seed(&config.seed)?;

        tokio::fs::create_dir_all(&config.out_dir)
            .await
            .map_err(|source| PipelineError::OutputDir {
                path: config.out_dir.clone(),
                source,
            })?;

        let handles = self.start_handles().await?;
        let pool = ResourcePool::new(handles)?;
        debug!(handles = pool.capacity(), idle = pool.available(), "renderer pool ready");

        let ctx = Arc::new(CrawlContext {
            queue: TaskQueue::new(),
            frontier: Frontier::new(),
            pool,
            renderer: Arc::clone(&self.renderer),
            scope: CrawlScope::new(&seed),
            out_dir: config.out_dir.clone(),
            wait: config.wait,
            stats: CrawlStats::default(),
        });

        info!(
            seed = %seed,
            host = ctx.scope.host(),
            workers = config.workers,
            out = %config.out_dir.display(),
            "crawl started"
        );

        if let Err(e) = ctx.queue.enqueue(Task::download(seed.as_str())) {
            warn!(error = %e, "seed task rejected");
        }

        let workers: Vec<_> = (0..config.workers)
            .map(|id| tokio::spawn(Worker::new(id, Arc::clone(&ctx)).run()))
            .collect();

        wait_for_quiescence(&ctx.queue, config.quiescence).await;
        ctx.queue.close();

        let mut executed = 0;
        for result in join_all(workers).await {
            match result {
                Ok(count) => executed += count,
                Err(e) => error!(error = %e, "worker task aborted"),
            }
        }

        for handle in ctx.pool.shutdown() {
            self.renderer.close(handle).await;
        }

        let mut report = CrawlReport::from_stats(seed.as_str(), &ctx.stats);
        info!(
            executed,
            claimed = ctx.frontier.len(),
            downloaded = report.pages_downloaded,
            converted = report.pages_converted,
            failed = report.failures.len(),
            "crawl finished"
        );

        match MergeStage::new(&config.out_dir, &config.final_name).run().await {
            Ok(summary) => {
                if summary.inputs > report.pages_converted {
                    warn!(
                        extra = summary.inputs - report.pages_converted,
                        out = %config.out_dir.display(),
                        "merged page PDFs left by an earlier run"
                    );
                }
                report.merged = Some(summary);
            }
            Err(e) => {
                error!(error = %e, "merge failed");
                report.merge_error = Some(e.to_string());
            }
        }

        Ok(report)
    }

    // Creates one handle per worker. On failure, closes the ones already open.
    async fn start_handles(&self) -> Result<Vec<R::Handle>, PipelineError> {
        let total = self.config.workers;
        let mut handles = Vec::with_capacity(total);

        for index in 0..total {
            match self.renderer.new_handle().await {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    for handle in handles {
                        self.renderer.close(handle).await;
                    }
                    return Err(PipelineError::RendererInit {
                        index,
                        total,
                        source,
                    });
                }
            }
        }

        Ok(handles)
    }
}

// The queue can look idle for a moment while a worker is between finishing a
// lease and a follow-up arriving from elsewhere; require it to stay idle.
async fn wait_for_quiescence(queue: &TaskQueue, window: Duration) {
    loop {
        queue.wait_idle().await;
        tokio::time::sleep(window).await;
        if queue.is_idle() {
            return;
        }
        debug!(
            pending = queue.pending(),
            in_flight = queue.in_flight(),
            "queue busy again after idle"
        );
    }
}
