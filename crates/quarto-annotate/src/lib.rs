//! Annotation resolution for academic notebooks.
//!
//! This crate rewrites a lightweight academic markup dialect embedded in
//! Jupyter notebooks (citations, numbered figures/tables/equations,
//! cross-references and nested callout/div blocks) into Markdown plus inline
//! HTML that a plain notebook viewer can display.
//!
//! # Architecture
//!
//! Processing is organized around these key types:
//!
//! - [`Bibliography`] - Brace-delimited bibliography records by key
//! - [`CitationFormatter`] - Author-date citations and reference entries
//! - [`ElementRegistry`] - Document-wide numbering of labeled elements
//! - [`fenced`] - Stack-based scanner and renderer for `:::` directives
//! - [`ResolvePipeline`] - Ordered rewrite stages for in-text markers
//! - [`process_notebook`] - The whole-document pipeline
//!
//! The registry is always built from the complete document before any cell
//! is rewritten, so forward references resolve.
//!
//! # Example
//!
//! ```ignore
//! use quarto_annotate::{AnnotateConfig, Bibliography, Notebook, process_notebook};
//!
//! let notebook = Notebook::from_file("cap01/cap01.ipynb".as_ref())?;
//! let bibliography = Bibliography::from_file("references.bib".as_ref())?;
//! let processed = process_notebook(notebook, &bibliography, &AnnotateConfig::default());
//!
//! processed.notebook.write("cap01/cap01_dist.ipynb".as_ref())?;
//! ```

pub mod attr;
pub mod bibliography;
pub mod callout;
pub mod citation;
pub mod config;
pub mod error;
pub mod fenced;
pub mod html;
pub mod notebook;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod resources;
pub mod syntax;

mod mask;

// Re-export commonly used types
pub use bibliography::{BibEntry, Bibliography};
pub use citation::{CitationFormatter, CiteItem};
pub use config::{AnnotateConfig, ConfigLayer, Language};
pub use error::{AnnotateError, Result};
pub use notebook::{Cell, CellKind, Notebook};
pub use pipeline::{
    DocumentOptions, ProcessedDocument, clean, load_config, output_path, process_file,
    process_notebook, reference_list,
};
pub use registry::{Element, ElementKind, ElementRegistry, Origin};
pub use resolve::{ResolvePipeline, ResolveReport, Resolver, Stage, StageContext};
pub use resources::{CopyOutcome, collect_images, copy_images};
