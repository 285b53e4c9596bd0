// src/render/chromium.rs
// =============================================================================
// Headless Chromium renderer built on chromiumoxide.
//
// Every handle is its own browser process with its own profile directory,
// so handles share nothing and can be driven by different workers at once.
//
// Download: open a tab on the URL, wait for the load event, let the page
//           settle, then read back the serialized DOM.
// Convert:  open the stored snapshot through file:// and print it to an A4
//           PDF with backgrounds.
// =============================================================================

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use super::{Renderer, WaitPolicy};
use crate::error::{BoxError, RenderError};

// A4 in inches, margins 25mm top/bottom and 20mm left/right
const PAPER_WIDTH_IN: f64 = 8.27;
const PAPER_HEIGHT_IN: f64 = 11.69;
const MARGIN_VERTICAL_IN: f64 = 0.98;
const MARGIN_HORIZONTAL_IN: f64 = 0.79;

// Runs in the rendered page before it is serialized. Stylesheets the page
// can read are copied into <style> elements and loaded images become data:
// URLs, so the snapshot renders from file:// without the site.
const INLINE_RESOURCES_SCRIPT: &str = r#"
(() => {
    let styles = 0;
    let images = 0;
    for (const link of Array.from(document.querySelectorAll('link[rel~="stylesheet"]'))) {
        let css;
        try {
            css = Array.from(link.sheet.cssRules).map((rule) => rule.cssText).join('
');
        } catch (e) {
            continue;
        }
        const style = document.createElement('style');
        if (link.media) {
            style.media = link.media;
        }
        style.textContent = css;
        link.replaceWith(style);
        styles++;
    }
    for (const img of Array.from(document.images)) {
        if (!img.complete || img.naturalWidth === 0 || img.currentSrc.startsWith('data:')) {
            continue;
        }
        const canvas = document.createElement('canvas');
        canvas.width = img.naturalWidth;
        canvas.height = img.naturalHeight;
        try {
            canvas.getContext('2d').drawImage(img, 0, 0);
            img.src = canvas.toDataURL();
            img.removeAttribute('srcset');
            images++;
        } catch (e) {
            // cross-origin image, keep the reference
        }
    }
    return { styles, images };
})()
"#;

#[derive(Debug, Deserialize)]
struct Inlined {
    styles: usize,
    images: usize,
}

#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    /// Explicit browser binary; otherwise common install paths are probed
    pub executable: Option<PathBuf>,
    /// Pass --no-sandbox (needed in most containers)
    pub no_sandbox: bool,
    /// Timeout of a single CDP request
    pub request_timeout: Duration,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            executable: None,
            no_sandbox: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One Chromium process plus the task pumping its CDP events.
#[derive(Debug)]
pub struct ChromiumHandle {
    browser: Browser,
    events: JoinHandle<()>,
    page: Option<Page>,
    profile_dir: PathBuf,
}

#[derive(Debug)]
pub struct ChromiumRenderer {
    options: ChromiumOptions,
    executable: Option<PathBuf>,
    launched: AtomicUsize,
}

impl ChromiumRenderer {
    pub fn new(options: ChromiumOptions) -> Self {
        let executable = options.executable.clone().or_else(find_browser_executable);
        match &executable {
            Some(path) => info!(path = %path.display(), "using browser executable"),
            None => warn!("no browser executable found, relying on chromiumoxide detection"),
        }
        Self {
            options,
            executable,
            launched: AtomicUsize::new(0),
        }
    }

    fn profile_dir(&self) -> PathBuf {
        let index = self.launched.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("docs2pdf-{}-{index}", std::process::id()))
    }
}

/// Probes the usual Chrome/Chromium install locations.
fn find_browser_executable() -> Option<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    };

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

async fn open_page(
    handle: &mut ChromiumHandle,
    url: &str,
    wait: WaitPolicy,
) -> Result<(), RenderError> {
    if let Some(previous) = handle.page.take() {
        if let Err(e) = previous.close().await {
            debug!(error = %e, "closing previous tab failed");
        }
    }

    let page = timeout(wait.timeout, handle.browser.new_page(url))
        .await
        .map_err(|_| RenderError::Timeout {
            operation: "navigation",
            after: wait.timeout,
        })?
        .map_err(|e| RenderError::backend("navigation", e))?;

    // The tab lives in the handle from here on, so a failed load is still
    // closed by the next open_page or by close()
    await_in_slot(&mut handle.page, page, "page load", wait.timeout, |page| {
        page.wait_for_navigation()
    })
    .await?;

    if !wait.settle.is_zero() {
        tokio::time::sleep(wait.settle).await;
    }
    Ok(())
}

/// Stores `page` in `slot`, then awaits `load` on it under `limit`.
///
/// The page stays in the slot whatever the outcome.
async fn await_in_slot<'a, P, T, E, F>(
    slot: &'a mut Option<P>,
    page: P,
    operation: &'static str,
    limit: Duration,
    load: impl FnOnce(&'a P) -> F,
) -> Result<T, RenderError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    let page: &'a P = slot.insert(page);
    match timeout(limit, load(page)).await {
        Err(_) => Err(RenderError::Timeout {
            operation,
            after: limit,
        }),
        Ok(result) => result.map_err(|e| RenderError::backend(operation, e)),
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    type Handle = ChromiumHandle;

    async fn new_handle(&self) -> Result<ChromiumHandle, RenderError> {
        let profile_dir = self.profile_dir();

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile_dir)
            .request_timeout(self.options.request_timeout);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if self.options.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(RenderError::Unavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::backend("browser launch", e))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser event error");
                }
            }
        });

        debug!(profile = %profile_dir.display(), "browser launched");
        Ok(ChromiumHandle {
            browser,
            events,
            page: None,
            profile_dir,
        })
    }

    async fn navigate(
        &self,
        handle: &mut ChromiumHandle,
        url: &str,
        wait: WaitPolicy,
    ) -> Result<(), RenderError> {
        open_page(handle, url, wait).await
    }

    async fn content(&self, handle: &mut ChromiumHandle) -> Result<Vec<u8>, RenderError> {
        let page = handle.page.as_ref().ok_or(RenderError::NoPage)?;

        // Best effort: a snapshot that keeps its references still converts
        match page.evaluate(INLINE_RESOURCES_SCRIPT).await {
            Ok(result) => match result.into_value::<Inlined>() {
                Ok(inlined) => debug!(
                    styles = inlined.styles,
                    images = inlined.images,
                    "inlined page resources"
                ),
                Err(e) => debug!(error = %e, "unexpected inlining result"),
            },
            Err(e) => warn!(error = %e, "inlining page resources failed"),
        }

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::backend("read page content", e))?;
        Ok(html.into_bytes())
    }

    async fn export_pdf(
        &self,
        handle: &mut ChromiumHandle,
        html_path: &Path,
        wait: WaitPolicy,
    ) -> Result<Vec<u8>, RenderError> {
        let absolute = tokio::fs::canonicalize(html_path)
            .await
            .map_err(|e| RenderError::backend("resolve snapshot path", e))?;
        let file_url = Url::from_file_path(&absolute).map_err(|()| {
            RenderError::Unavailable(format!("not a file path: {}", absolute.display()))
        })?;

        open_page(handle, file_url.as_str(), wait).await?;
        let page = handle.page.as_ref().ok_or(RenderError::NoPage)?;

        let params = PrintToPdfParams {
            print_background: Some(true),
            paper_width: Some(PAPER_WIDTH_IN),
            paper_height: Some(PAPER_HEIGHT_IN),
            margin_top: Some(MARGIN_VERTICAL_IN),
            margin_bottom: Some(MARGIN_VERTICAL_IN),
            margin_left: Some(MARGIN_HORIZONTAL_IN),
            margin_right: Some(MARGIN_HORIZONTAL_IN),
            ..Default::default()
        };

        timeout(wait.timeout, page.pdf(params))
            .await
            .map_err(|_| RenderError::Timeout {
                operation: "pdf export",
                after: wait.timeout,
            })?
            .map_err(|e| RenderError::backend("pdf export", e))
    }

    async fn close(&self, mut handle: ChromiumHandle) {
        if let Some(page) = handle.page.take() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "closing last tab failed");
            }
        }
        if let Err(e) = handle.browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        if let Err(e) = handle.browser.wait().await {
            debug!(error = %e, "waiting for browser exit failed");
        }
        handle.events.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&handle.profile_dir).await {
            debug!(
                path = %handle.profile_dir.display(),
                error = %e,
                "profile directory cleanup failed"
            );
        }
    }
}
