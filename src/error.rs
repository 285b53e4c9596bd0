// src/error.rs
// =============================================================================
// Error taxonomy for the crawl-and-convert pipeline.
//
// Three tiers:
// - PipelineError: fatal, aborts the run before any worker starts
// - TaskError: recoverable, logged by the worker and the task is dropped
// - MergeError: terminal outcome of an otherwise successful crawl
//
// The renderer, pool and queue have their own small error types so each
// collaborator can be tested on its own.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error coming from a third-party backend (browser, PDF writer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort the whole run before work starts.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot initialize renderer handle {index} of {total}: {source}")]
    RendererInit {
        index: usize,
        total: usize,
        #[source]
        source: RenderError,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Errors reported by a renderer backend.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("no page loaded in this handle")]
    NoPage,

    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

impl RenderError {
    /// Wraps any backend error with the name of the operation that failed.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        RenderError::Backend {
            operation,
            source: source.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("resource pool needs at least one handle")]
    Empty,

    #[error("resource pool is shut down")]
    Closed,
}

/// Returned by `TaskQueue::enqueue` once the queue no longer accepts work.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("task queue is closed")]
pub struct QueueClosed;

/// Per-task failures. Logged and the task is discarded.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed URL '{0}'")]
    MalformedUrl(String),

    #[error("convert task for {0} carries no HTML artifact")]
    MissingArtifact(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Failures of the final merge step.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no .{extension} artifacts found in {}", dir.display())]
    NoArtifacts { dir: PathBuf, extension: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read PDF {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("merged input has no {0} object")]
    MissingObject(&'static str),

    #[error("cannot write merged PDF: {0}")]
    Write(#[source] BoxError),

    #[error("merge worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
