// src/output/artifact.rs
// =============================================================================
// Where per-page artifacts live on disk.
//
// The file name is a pure function of (output dir, URL, extension):
//
//   https://docs.example.com/guide/install  ->  guide_install--1a2b3c4d5e6f7081.html
//   https://docs.example.com/               ->  _index--5e6f7a8b9c0d1e2f.html
//
// The readable part keeps filename-sorted merges close to site order. The
// short hash of the canonical URL keeps distinct URLs apart even when their
// readable parts collide ("a/b" vs "a_b").
// =============================================================================

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::crawl::canonicalize;
use crate::error::TaskError;

const MAX_STEM_LEN: usize = 80;
const HASH_BYTES: usize = 8;

/// Derives the artifact path for `url` with the given extension.
pub fn artifact_path(out_dir: &Path, url: &str, extension: &str) -> PathBuf {
    // Canonical form so every spelling of a URL maps to the same file
    let (key, stem) = match canonicalize(url) {
        Some(canonical) => (canonical.to_string(), sanitize_path(canonical.path())),
        None => (url.to_string(), sanitize_path(url)),
    };

    let extension = extension.trim_start_matches('.');
    out_dir.join(format!("{stem}--{}.{extension}", short_hash(&key)))
}

fn sanitize_path(path: &str) -> String {
    let joined = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment
                .chars()
                .map(|c| if is_forbidden(c) { '_' } else { c })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_");

    let mut stem = joined.trim_matches(&['_', ' ', '.'][..]).to_string();
    if stem.is_empty() {
        return "_index".to_string();
    }
    if stem.len() > MAX_STEM_LEN {
        let mut cut = MAX_STEM_LEN;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem.truncate(cut);
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' | '\0'..='\u{1F}'
    )
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(HASH_BYTES).map(|byte| format!("{byte:02x}")).collect()
}

/// Writes an artifact, creating its directory if needed. Overwrites.
pub async fn persist(path: &Path, bytes: &[u8]) -> Result<(), TaskError> {
    let io_error = |source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    fs::write(path, bytes).await.map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(path: PathBuf) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn test_path_is_idempotent() {
        let out = Path::new("output");
        let first = artifact_path(out, "https://docs.example.com/guide", ".pdf");
        let second = artifact_path(out, "https://docs.example.com/guide", ".pdf");
        assert_eq!(first, second);
        assert_eq!(first.parent(), Some(out));
        assert!(name(first).ends_with(".pdf"));
    }

    #[test]
    fn test_equivalent_urls_share_a_path() {
        let out = Path::new("output");
        assert_eq!(
            artifact_path(out, "https://docs.example.com/guide/", "html"),
            artifact_path(out, "https://docs.example.com/guide#intro", "html"),
        );
    }

    #[test]
    fn test_readable_collisions_stay_distinct() {
        let out = Path::new("output");
        let nested = artifact_path(out, "https://docs.example.com/a/b", "html");
        let flat = artifact_path(out, "https://docs.example.com/a_b", "html");
        assert_ne!(nested, flat);
        assert!(name(nested).starts_with("a_b--"));
        assert!(name(flat).starts_with("a_b--"));
    }

    #[test]
    fn test_hash_suffix_is_sixteen_hex_digits() {
        let path = artifact_path(Path::new("out"), "https://docs.example.com/guide", "html");
        let name = name(path);
        let suffix = name
            .strip_prefix("guide--")
            .and_then(|rest| rest.strip_suffix(".html"))
            .unwrap();
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_root_page_name() {
        let path = artifact_path(Path::new("out"), "https://docs.example.com/", "html");
        assert!(name(path).starts_with("_index--"));
    }

    #[test]
    fn test_extension_is_swapped_not_appended() {
        let out = Path::new("out");
        let html = artifact_path(out, "https://docs.example.com/page.html", "html");
        let pdf = artifact_path(out, "https://docs.example.com/page.html", "pdf");
        assert_eq!(html.with_extension("pdf"), pdf);
    }

    #[test]
    fn test_forbidden_characters_are_replaced() {
        let path = artifact_path(Path::new("out"), "https://docs.example.com/a:b/c*d", "html");
        let name = name(path);
        assert!(name.starts_with("a_b_c_d--"), "{name}");
    }

    #[tokio::test]
    async fn test_persist_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/page.html");
        persist(&path, b"<html></html>").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<html></html>");
    }
}
