/*
 * glob_expand.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Expansion of notebook path arguments.
 */

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Expand glob patterns into notebook paths.
///
/// A pattern without glob characters (`*`, `?`, `[`) is taken as a literal
/// path and must exist. Generated outputs carrying `skip_suffix` in their
/// stem are left out of glob matches so re-runs do not process them again.
pub fn expand_globs(patterns: &[String], skip_suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let paths = glob::glob(pattern)
                .with_context(|| format!("Invalid glob pattern: {}", pattern))?;

            let mut match_count = 0;
            for path in paths {
                let path =
                    path.with_context(|| format!("Failed to read glob match for: {}", pattern))?;
                let generated = !skip_suffix.is_empty()
                    && path
                        .file_stem()
                        .is_some_and(|stem| stem.to_string_lossy().ends_with(skip_suffix));
                if generated {
                    continue;
                }
                if !files.contains(&path) {
                    files.push(path);
                }
                match_count += 1;
            }

            if match_count == 0 {
                tracing::warn!(pattern = %pattern, "No files matched pattern");
            }
        } else {
            let path = PathBuf::from(pattern);
            if !path.exists() {
                anyhow::bail!("File not found: {}", pattern);
            }
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}
