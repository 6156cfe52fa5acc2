/*
 * resources.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Image resources referenced by a document.
 */

//! Image resource collection.
//!
//! Every local image referenced from a markdown cell, either as a markdown
//! image or as an HTML `<img src>`, is listed once in first-seen order so the
//! images can be copied next to the rendered notebook.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AnnotateError, Result};
use crate::mask::MaskedText;
use crate::notebook::{Cell, CellKind};

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[(?:[^\[\]]|\[[^\[\]]*\])*\]\(([^)\s"']+)"#)
        .expect("Invalid regex pattern for markdown images")
});

static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#)
        .expect("Invalid regex pattern for html images")
});

/// Whether a reference points outside the local filesystem.
fn is_external(url: &str) -> bool {
    url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("data:")
        || url.starts_with("//")
}

/// Local image paths referenced from markdown cells, deduplicated, in
/// first-seen order.
pub fn collect_images(cells: &[Cell]) -> Vec<String> {
    let mut images: Vec<String> = Vec::new();
    for cell in cells.iter().filter(|c| c.kind == CellKind::Markdown) {
        let masked = MaskedText::new(&cell.source);
        let text = masked.text();
        let found = MARKDOWN_IMAGE
            .captures_iter(text)
            .chain(HTML_IMAGE.captures_iter(text))
            .filter_map(|caps| caps.get(1))
            .map(|m| (m.start(), m.as_str()));
        let mut found: Vec<(usize, &str)> = found.collect();
        found.sort_by_key(|(start, _)| *start);

        for (_, url) in found {
            if is_external(url) || images.iter().any(|i| i == url) {
                continue;
            }
            images.push(url.to_string());
        }
    }
    images
}

/// Result of copying one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { from: PathBuf, to: PathBuf },
    /// Source and destination are the same file.
    InPlace(PathBuf),
    Missing(String),
}

/// Copy `images` from beside the source notebook to `out_dir`, keeping their
/// relative layout.
///
/// A path not found next to the notebook is looked up relative to the
/// working directory. Missing images are reported, not treated as errors.
pub fn copy_images(images: &[String], source_dir: &Path, out_dir: &Path) -> Result<Vec<CopyOutcome>> {
    let mut outcomes = Vec::with_capacity(images.len());
    for image in images {
        let relative = Path::new(image);
        let destination = if relative.is_absolute() {
            match relative.file_name() {
                Some(name) => out_dir.join(name),
                None => {
                    outcomes.push(CopyOutcome::Missing(image.clone()));
                    continue;
                }
            }
        } else {
            out_dir.join(relative)
        };

        let Some(source) = [source_dir.join(relative), relative.to_path_buf()]
            .into_iter()
            .find(|candidate| candidate.is_file())
        else {
            tracing::warn!(image = %image, "Image not found");
            outcomes.push(CopyOutcome::Missing(image.clone()));
            continue;
        };

        if same_file(&source, &destination) {
            outcomes.push(CopyOutcome::InPlace(destination));
            continue;
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, &destination).map_err(|e| AnnotateError::read(&source, e))?;
        tracing::debug!(from = %source.display(), to = %destination.display(), "Copied image");
        outcomes.push(CopyOutcome::Copied {
            from: source,
            to: destination,
        });
    }
    Ok(outcomes)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
