// src/output/merge.rs
// =============================================================================
// Merge stage: turns the per-page PDFs into one document.
//
// 1. List every *.pdf in the output directory (except the merged file itself)
// 2. Sort by file name, so the result does not depend on crawl order
// 3. Renumber each input's objects into one id space and graft all pages
//    under a single page tree
// 4. Write the merged document to <out>/<final name>
//
// An empty input set is an error; we never write an empty PDF.
// =============================================================================

use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::MergeError;

pub const PDF_EXTENSION: &str = "pdf";

#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub inputs: usize,
    pub pages: usize,
}

#[derive(Debug, Clone)]
pub struct MergeStage {
    out_dir: PathBuf,
    final_name: String,
}

impl MergeStage {
    pub fn new(out_dir: impl Into<PathBuf>, final_name: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            final_name: final_name.into(),
        }
    }

    pub fn final_path(&self) -> PathBuf {
        self.out_dir.join(&self.final_name)
    }

    /// Per-page PDFs in merge order.
    pub async fn collect(&self) -> Result<Vec<PathBuf>, MergeError> {
        let io_error = |source| MergeError::Io {
            path: self.out_dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.out_dir).await.map_err(io_error)?;
        let mut inputs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION));
            let is_final = entry.file_name().to_string_lossy() == self.final_name;
            if is_pdf && !is_final && entry.file_type().await.map_err(io_error)?.is_file() {
                inputs.push(path);
            }
        }

        inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(inputs)
    }

    /// Merges every collected PDF into the final document.
    pub async fn run(&self) -> Result<MergeSummary, MergeError> {
        let inputs = self.collect().await?;
        if inputs.is_empty() {
            return Err(MergeError::NoArtifacts {
                dir: self.out_dir.clone(),
                extension: PDF_EXTENSION.to_string(),
            });
        }
        info!(inputs = inputs.len(), "merging page PDFs");

        let count = inputs.len();
        let (bytes, pages) = tokio::task::spawn_blocking(move || merge_pdfs(&inputs)).await??;

        let output = self.final_path();
        tokio::fs::write(&output, &bytes)
            .await
            .map_err(|source| MergeError::Io {
                path: output.clone(),
                source,
            })?;

        info!(path = %output.display(), pages, "merged document written");
        Ok(MergeSummary {
            output,
            inputs: count,
            pages,
        })
    }
}

fn type_of(object: &Object) -> Option<&[u8]> {
    object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()
}

/// Merges the given PDFs in order. Returns the encoded document and its page count.
pub fn merge_pdfs(inputs: &[PathBuf]) -> Result<(Vec<u8>, usize), MergeError> {
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects = Vec::new();

    for path in inputs {
        let mut doc = load(path)?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let page = doc.get_object(page_id).map_err(|source| MergeError::Load {
                path: path.clone(),
                source,
            })?;
            pages.push((page_id, page.clone()));
        }
        debug!(path = %path.display(), objects = doc.objects.len(), "loaded page PDF");
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut page_tree: Option<(ObjectId, lopdf::Dictionary)> = None;

    for (id, object) in objects {
        let kind = type_of(&object).map(<[u8]>::to_vec);
        match kind.as_deref() {
            Some(b"Catalog") => {
                // Keep the first catalog, the others are rebuilt from it
                if catalog.is_none() {
                    catalog = Some((id, object));
                }
            }
            Some(b"Pages") => {
                if let Ok(dict) = object.as_dict() {
                    match page_tree.as_mut() {
                        Some((_, tree)) => tree.extend(dict),
                        None => page_tree = Some((id, dict.clone())),
                    }
                }
            }
            Some(b"Page") | Some(b"Outlines") | Some(b"Outline") => {}
            _ => {
                merged.objects.insert(id, object);
            }
        }
    }

    let (tree_id, mut tree) = page_tree.ok_or(MergeError::MissingObject("page tree"))?;
    let (catalog_id, catalog) = catalog.ok_or(MergeError::MissingObject("catalog"))?;

    for (page_id, page) in &pages {
        if let Ok(dict) = page.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", tree_id);
            merged.objects.insert(*page_id, Object::Dictionary(dict));
        }
    }

    tree.set("Count", pages.len() as i64);
    tree.set(
        "Kids",
        pages
            .iter()
            .map(|(id, _)| Object::Reference(*id))
            .collect::<Vec<_>>(),
    );
    merged.objects.insert(tree_id, Object::Dictionary(tree));

    let mut catalog = catalog
        .as_dict()
        .map_err(|_| MergeError::MissingObject("catalog"))?
        .clone();
    catalog.set("Pages", tree_id);
    catalog.remove(b"Outlines");
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged.trailer.set("Root", catalog_id);

    merged.max_id = merged.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    merged.renumber_objects();
    merged.compress();

    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|e| MergeError::Write(e.into()))?;
    Ok((bytes, pages.len()))
}

fn load(path: &Path) -> Result<Document, MergeError> {
    Document::load(path).map_err(|source| MergeError::Load {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fake::pdf_with_text;

    fn write_pdf(dir: &Path, name: &str, text: &str) {
        std::fs::write(dir.join(name), pdf_with_text(text)).unwrap();
    }

    #[tokio::test]
    async fn test_collect_sorts_by_file_name_and_skips_final() {
        let dir = tempfile::tempdir().unwrap();
        write_pdf(dir.path(), "b--2.pdf", "b");
        write_pdf(dir.path(), "a--1.pdf", "a");
        write_pdf(dir.path(), "final.pdf", "old merge");
        std::fs::write(dir.path().join("a--1.html"), "<html></html>").unwrap();

        let stage = MergeStage::new(dir.path(), "final.pdf");
        let inputs = stage.collect().await.unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a--1.pdf", "b--2.pdf"]);
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let stage = MergeStage::new(dir.path(), "final.pdf");
        let err = stage.run().await.unwrap_err();
        assert!(matches!(err, MergeError::NoArtifacts { .. }));
        assert!(!stage.final_path().exists());
    }

    #[tokio::test]
    async fn test_merge_keeps_every_page() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["c--3.pdf", "a--1.pdf", "b--2.pdf"].iter().enumerate() {
            write_pdf(dir.path(), name, &format!("page {i}"));
        }

        let summary = MergeStage::new(dir.path(), "final.pdf").run().await.unwrap();
        assert_eq!(summary.inputs, 3);
        assert_eq!(summary.pages, 3);

        let merged = Document::load(&summary.output).unwrap();
        assert_eq!(merged.get_pages().len(), 3);
    }

    #[tokio::test]
    async fn test_merge_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_pdf(dir.path(), "guide--1.pdf", "guide");
        write_pdf(dir.path(), "_index--0.pdf", "index");

        let stage = MergeStage::new(dir.path(), "final.pdf");
        let first = std::fs::read(stage.run().await.unwrap().output).unwrap();
        let second = std::fs::read(stage.run().await.unwrap().output).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unreadable_input_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.pdf");
        std::fs::write(&bogus, b"not a pdf").unwrap();
        match merge_pdfs(&[bogus.clone()]) {
            Err(MergeError::Load { path, .. }) => assert_eq!(path, bogus),
            other => panic!("expected load error, got {other:?}"),
        }
    }
}
