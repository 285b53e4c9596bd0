// src/render/mod.rs
// =============================================================================
// Rendering: the seam between the pipeline and a page-rendering engine.
//
// Submodules:
// - pool: fixed-size pool of renderer handles with scoped borrowing
// - chromium: headless Chromium backend (chromiumoxide)
// - fake: scripted in-memory renderer used by the tests
//
// A handle is not re-entrant. The pool guarantees only one worker touches
// a handle at a time, and the trait takes `&mut Handle` so the borrow checker
// enforces the same thing at every call site.
// =============================================================================

mod chromium;
#[cfg(test)]
pub mod fake;
mod pool;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RenderError;

pub use chromium::{ChromiumOptions, ChromiumRenderer};
pub use pool::ResourcePool;

/// How long to wait for a page before snapshotting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Upper bound on navigation, load and PDF export
    pub timeout: Duration,
    /// Quiet period after the load event, approximating "network idle"
    pub settle: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            settle: Duration::from_millis(500),
        }
    }
}

#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// Creates one renderer instance.
    async fn new_handle(&self) -> Result<Self::Handle, RenderError>;

    /// Loads `url` into the handle and waits according to `wait`.
    async fn navigate(
        &self,
        handle: &mut Self::Handle,
        url: &str,
        wait: WaitPolicy,
    ) -> Result<(), RenderError>;

    /// Serialized DOM of the page last loaded with `navigate`.
    async fn content(&self, handle: &mut Self::Handle) -> Result<Vec<u8>, RenderError>;

    /// Opens a stored HTML snapshot and prints it to PDF bytes.
    async fn export_pdf(
        &self,
        handle: &mut Self::Handle,
        html_path: &Path,
        wait: WaitPolicy,
    ) -> Result<Vec<u8>, RenderError>;

    /// Destroys the handle. Only called at shutdown.
    async fn close(&self, handle: Self::Handle);
}
