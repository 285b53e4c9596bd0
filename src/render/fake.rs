// src/render/fake.rs
// =============================================================================
// Scripted renderer for tests.
//
// Serves pages from an in-memory site map, can be told to time out on given
// URLs, to panic, or to fail while creating handles, and records what it was asked to
// do. It also checks that no handle is ever used by two callers at once.
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use parking_lot::Mutex;

use super::{Renderer, WaitPolicy};
use crate::crawl::canonicalize;
use crate::error::RenderError;

#[derive(Debug)]
pub struct FakeHandle {
    pub id: usize,
    loaded: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeRenderer {
    pages: HashMap<String, String>,
    timeouts: HashSet<String>,
    panics: HashSet<String>,
    fail_handle_at: Option<usize>,
    delay: Duration,

    created: AtomicUsize,
    closed: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    exports: Mutex<Vec<PathBuf>>,
    busy: Mutex<HashSet<usize>>,
    overlaps: AtomicUsize,
}

fn key(url: &str) -> String {
    canonicalize(url)
        .map(String::from)
        .unwrap_or_else(|| url.to_string())
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `html` for `url`.
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(key(url), html.to_string());
        self
    }

    /// Navigation to `url` fails with a timeout.
    pub fn timeout_on(mut self, url: &str) -> Self {
        self.timeouts.insert(key(url));
        self
    }

    /// Navigation to `url` panics.
    pub fn panic_on(mut self, url: &str) -> Self {
        self.panics.insert(key(url));
        self
    }

    /// Creating the handle with this zero-based index fails.
    pub fn fail_handle_at(mut self, index: usize) -> Self {
        self.fail_handle_at = Some(index);
        self
    }

    /// Artificial latency per renderer call, to widen race windows.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    pub fn exports(&self) -> Vec<PathBuf> {
        self.exports.lock().clone()
    }

    /// Times a handle was entered while another call was still using it.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    async fn enter(&self, handle: &FakeHandle) {
        if !self.busy.lock().insert(handle.id) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn leave(&self, handle: &FakeHandle) {
        self.busy.lock().remove(&handle.id);
    }
}

/// Builds a one-page PDF showing `text`.
pub fn pdf_with_text(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let encoded = content.encode().unwrap_or_default();
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    let _ = doc.save_to(&mut bytes);
    bytes
}

#[async_trait]
impl Renderer for FakeRenderer {
    type Handle = FakeHandle;

    async fn new_handle(&self) -> Result<FakeHandle, RenderError> {
        let id = self.created.fetch_add(1, Ordering::SeqCst);
        if self.fail_handle_at == Some(id) {
            return Err(RenderError::Unavailable(format!("handle {id} refused")));
        }
        Ok(FakeHandle { id, loaded: None })
    }

    async fn navigate(
        &self,
        handle: &mut FakeHandle,
        url: &str,
        wait: WaitPolicy,
    ) -> Result<(), RenderError> {
        let key = key(url);
        if self.panics.contains(&key) {
            panic!("renderer crashed on {url}");
        }

        self.enter(handle).await;
        self.navigations.lock().push(url.to_string());

        let result = if self.timeouts.contains(&key) {
            Err(RenderError::Timeout {
                operation: "navigation",
                after: wait.timeout,
            })
        } else if self.pages.contains_key(&key) {
            handle.loaded = Some(key);
            Ok(())
        } else {
            Err(RenderError::backend("navigation", format!("no page at {url}")))
        };

        self.leave(handle);
        result
    }

    async fn content(&self, handle: &mut FakeHandle) -> Result<Vec<u8>, RenderError> {
        self.enter(handle).await;
        let html = handle
            .loaded
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .map(|html| html.clone().into_bytes())
            .ok_or(RenderError::NoPage);
        self.leave(handle);
        html
    }

    async fn export_pdf(
        &self,
        handle: &mut FakeHandle,
        html_path: &Path,
        _wait: WaitPolicy,
    ) -> Result<Vec<u8>, RenderError> {
        self.enter(handle).await;
        let result = tokio::fs::read_to_string(html_path)
            .await
            .map(|html| pdf_with_text(&html.chars().take(60).collect::<String>()))
            .map_err(|e| RenderError::backend("pdf export", e));
        self.exports.lock().push(html_path.to_path_buf());
        self.leave(handle);
        result
    }

    async fn close(&self, _handle: FakeHandle) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
