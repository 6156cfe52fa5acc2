/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for quarto-annotate.
 */

//! Error types for quarto-annotate.
//!
//! Resolution problems (unknown ids, unknown citation keys, malformed
//! directives) never surface here: they degrade to visible fallback text.
//! The only failures that propagate are those that prevent a whole document
//! from being read or written.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid notebook: {0}")]
    InvalidNotebook(String),

    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl AnnotateError {
    /// Attach the offending path to an I/O error.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
