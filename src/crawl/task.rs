// src/crawl/task.rs
// =============================================================================
// Units of work flowing through the task queue.
//
// A Task is immutable once created. The driver creates the seed Download
// task, workers create the follow-ups: one Download per newly discovered
// link and one Convert per successfully downloaded page.
//
// Per-task state machine:
//
//   Pending -> Claimed -> Succeeded
//                      -> Failed
//   Pending -> Discarded            (download whose URL was already claimed)
// =============================================================================

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Navigate to the URL and store an HTML snapshot
    Download,
    /// Export a stored HTML snapshot to PDF
    Convert,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Download => f.write_str("download"),
            TaskKind::Convert => f.write_str("convert"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    url: String,
    kind: TaskKind,
    artifact: Option<PathBuf>,
}

impl Task {
    pub fn download(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: TaskKind::Download,
            artifact: None,
        }
    }

    /// A convert task carries the HTML path produced by its download.
    pub fn convert(url: impl Into<String>, html_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            kind: TaskKind::Convert,
            artifact: Some(html_path.into()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Claimed,
    Succeeded,
    Failed,
    Discarded,
}

impl TaskState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Claimed) | (Pending, Discarded) | (Claimed, Succeeded) | (Claimed, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Discarded
        )
    }
}

/// What a worker reports after executing one task.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Another worker already claimed this URL
    Discarded,
    /// `follow_ups` tasks were pushed back onto the queue
    Succeeded { follow_ups: usize },
    Failed(TaskError),
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Discarded => TaskState::Discarded,
            TaskOutcome::Succeeded { .. } => TaskState::Succeeded,
            TaskOutcome::Failed(_) => TaskState::Failed,
        }
    }
}
