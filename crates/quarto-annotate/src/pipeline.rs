/*
 * pipeline.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Whole-document annotation resolution.
 */

//! Document pipeline.
//!
//! Processing one notebook runs, in order:
//!
//! 1. distribution cleanup ([`clean`]) when enabled
//! 2. the element registry scan over every cell
//! 3. per markdown cell: fenced directive rendering, then reference
//!    resolution
//! 4. per code cell: removal of every `#|` option line when cleaning, else
//!    of the label directives of labeled cells
//! 5. per labeled code cell: caption cell injection (tables before the cell,
//!    figures after it)
//! 6. the reference list, replacing the cell holding the `::: {#refs}`
//!    marker or appended at the end
//!
//! Cells keep their original order; generated cells are marked in their
//! metadata under [`config::METADATA_KEY`].

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::bibliography::Bibliography;
use crate::citation::CitationFormatter;
use crate::config::{self, AnnotateConfig, ConfigLayer, PROJECT_CONFIG_FILE};
use crate::error::Result;
use crate::fenced::{self, BlockContext};
use crate::notebook::{Cell, CellKind, Notebook};
use crate::registry::{ElementKind, ElementRegistry};
use crate::resolve::{ResolveReport, Resolver};
use crate::resources;
use crate::syntax;

/// `::: {#refs}` ... `:::` or `\printbibliography`.
static REFS_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^ {0,3}:{3,}[ \t]*\{#refs[^}]*\}[ \t]*\n(?:[ \t]*\n)*[ \t]*:{3,}[ \t]*$|\\printbibliography\b",
    )
    .expect("Invalid regex pattern for reference list markers")
});

static ECHO_FALSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*#\|\s*echo\s*:\s*false\s*$").expect("Invalid regex pattern for echo option")
});

/// Heading of a reference section left over from an earlier render.
static REF_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)##\s+refer[eê]ncias?\s+(?:do\s+)?cap[ií]tulo|##\s+refer[eê]ncias?\s+bibliogr[aá]ficas?")
        .expect("Invalid regex pattern for reference sections")
});

/// Colab renders a cell starting with this line as a collapsed form.
const FORM_HEADER: &str = "# @title { display-mode: \"form\" }";

/// Notebook metadata keys removed by [`clean`].
const QUARTO_METADATA_KEYS: &[&str] = &["quarto", "quarto-version"];

/// A processed notebook and what was found while processing it.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub notebook: Notebook,
    pub report: ResolveReport,
    /// Local images referenced from markdown cells.
    pub images: Vec<String>,
    /// Number of registered figures, tables and equations.
    pub elements: usize,
    /// Element ids defined more than once.
    pub duplicates: Vec<String>,
}

/// Where to look for configuration besides the notebook itself.
#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    /// Explicit project configuration file. When absent, `_annotate.yml` next
    /// to the document is used if it exists.
    pub project_config: Option<PathBuf>,
    /// Highest-precedence layer, typically from command-line flags.
    pub overrides: ConfigLayer,
}

/// Read, configure and process one notebook file.
pub fn process_file(path: &Path, options: &DocumentOptions) -> Result<ProcessedDocument> {
    let notebook = Notebook::from_file(path)?;
    let config = load_config(path, &notebook, options)?;
    let bibliography = load_bibliography(&config)?;
    let processed = process_notebook(notebook, &bibliography, &config);
    tracing::info!(
        document = %path.display(),
        elements = processed.elements,
        citations = processed.report.cited.len(),
        unresolved = processed.report.unresolved_citations.len()
            + processed.report.unresolved_references.len(),
        "Resolved document"
    );
    Ok(processed)
}

/// Merge project, notebook and override layers for `document`.
pub fn load_config(
    document: &Path,
    notebook: &Notebook,
    options: &DocumentOptions,
) -> Result<AnnotateConfig> {
    let document_dir = document.parent().unwrap_or(Path::new("."));

    let project = match &options.project_config {
        Some(file) => ConfigLayer::from_yaml_file(file)?,
        None => {
            let candidate = document_dir.join(PROJECT_CONFIG_FILE);
            if candidate.is_file() {
                tracing::debug!(config = %candidate.display(), "Using project configuration");
                ConfigLayer::from_yaml_file(&candidate)?
            } else {
                ConfigLayer::default()
            }
        }
    };
    let metadata = ConfigLayer::from_metadata(&notebook.metadata).rebased(document_dir);

    Ok(project
        .merge(metadata)
        .merge(options.overrides.clone())
        .resolve())
}

/// Load the configured bibliography, or an empty one.
pub fn load_bibliography(config: &AnnotateConfig) -> Result<Bibliography> {
    match &config.bibliography {
        Some(path) => Bibliography::from_file(path),
        None => {
            tracing::debug!("No bibliography configured");
            Ok(Bibliography::new())
        }
    }
}

/// Output location for `input`: `<stem><suffix>.ipynb`, in `output_dir` when
/// given, else next to the input.
pub fn output_path(input: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "notebook".to_string());
    let name = format!("{}{}.ipynb", stem, suffix);
    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Resolve every dialect marker of `notebook`.
pub fn process_notebook(
    mut notebook: Notebook,
    bibliography: &Bibliography,
    config: &AnnotateConfig,
) -> ProcessedDocument {
    if config.clean {
        clean(&mut notebook);
    }

    let registry = ElementRegistry::build(&notebook.cells);
    let images = resources::collect_images(&notebook.cells);
    let use_ids = notebook.uses_cell_ids();
    let block_ctx = BlockContext {
        registry: &registry,
        lang: config.lang,
    };
    let mut resolver = Resolver::new(&registry, bibliography, config.lang);

    let original = std::mem::take(&mut notebook.cells);
    let mut cells: Vec<Cell> = Vec::with_capacity(original.len() + 1);
    let mut marker_cell: Option<usize> = None;

    for (index, mut cell) in original.iter().cloned().enumerate() {
        match cell.kind {
            CellKind::Markdown => {
                if is_generated(&cell, "references") {
                    cells.push(cell);
                    continue;
                }
                if marker_cell.is_none() && REFS_MARKER.is_match(&cell.source) {
                    marker_cell = Some(cells.len());
                }
                let rendered = fenced::rewrite(&cell.source, &block_ctx, &mut |text: &str| {
                    resolver.resolve(text)
                });
                cell.source = resolver.resolve(&rendered);
                cells.push(cell);
            }
            CellKind::Code => {
                let element = registry.code_cell_element(index);
                if config.clean {
                    cell.source = syntax::strip_cell_directives(&cell.source);
                } else if config.strip_directives && element.is_some() {
                    cell.source = syntax::strip_label_directives(&cell.source);
                }
                let Some(element) = element else {
                    cells.push(cell);
                    continue;
                };

                let label = element.label(config.lang);
                let caption_text = if element.caption.is_empty() {
                    format!("**{}**", label)
                } else {
                    format!("**{}:** {}", label, element.caption)
                };
                let caption_source =
                    resolver.resolve(&format!("<a id=\"{}\"></a>\n\n{}", element.id, caption_text));
                let mut caption = Cell::markdown(caption_source);
                caption.set_metadata(
                    config::METADATA_KEY,
                    json!({"generated": "caption", "id": element.id}),
                );
                if use_ids {
                    caption
                        .extra
                        .insert("id".to_string(), Value::from(generated_id("caption", &element.id)));
                }

                match element.kind {
                    ElementKind::Table => {
                        let already = cells.last().is_some_and(|c| is_caption_for(c, &element.id));
                        if !already {
                            cells.push(caption);
                        }
                        cells.push(cell);
                    }
                    _ => {
                        let already = original
                            .get(index + 1)
                            .is_some_and(|c| is_caption_for(c, &element.id));
                        cells.push(cell);
                        if !already {
                            cells.push(caption);
                        }
                    }
                }
            }
            CellKind::Raw => cells.push(cell),
        }
    }

    let report = resolver.into_report();
    let references = if config.suppress_bibliography {
        None
    } else {
        reference_list(&report, bibliography, config)
    };

    match (marker_cell, references) {
        (Some(position), Some(list)) => {
            let cell = &mut cells[position];
            cell.source = list;
            cell.set_metadata(config::METADATA_KEY, json!({"generated": "references"}));
        }
        (Some(position), None) => {
            cells.remove(position);
        }
        (None, Some(list)) if !report.cited.is_empty() => {
            let mut cell = Cell::markdown(list);
            cell.set_metadata(config::METADATA_KEY, json!({"generated": "references"}));
            if use_ids {
                cell.extra
                    .insert("id".to_string(), Value::from(generated_id("references", "list")));
            }
            cells.push(cell);
        }
        _ => {}
    }

    notebook.cells = cells;
    ProcessedDocument {
        notebook,
        elements: registry.len(),
        duplicates: registry.duplicates().to_vec(),
        report,
        images,
    }
}

/// Markdown for the reference list, or `None` when there is nothing to list.
///
/// Cited keys and `nocite` keys are listed once each, ordered by author and
/// year. A `nocite` entry of `*` lists the whole bibliography.
pub fn reference_list(
    report: &ResolveReport,
    bibliography: &Bibliography,
    config: &AnnotateConfig,
) -> Option<String> {
    let formatter = CitationFormatter::new(bibliography, config.lang);

    let mut entries: Vec<_> = if config.nocite.iter().any(|k| k == "*") {
        bibliography.entries().collect()
    } else {
        let mut keys: Vec<&str> = report.cited.iter().map(String::as_str).collect();
        for key in &config.nocite {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys.into_iter()
            .filter_map(|key| {
                let entry = bibliography.get(key);
                if entry.is_none() {
                    tracing::warn!(key = %key, "Listed key not found in bibliography");
                }
                entry
            })
            .collect()
    };
    if entries.is_empty() {
        return None;
    }
    entries.sort_by_cached_key(|entry| formatter.sort_key(entry));

    let mut parts = vec![format!("## {}", config.references_title)];
    parts.extend(entries.iter().map(|entry| formatter.reference_entry(entry)));
    Some(parts.join("\n\n"))
}

/// Prepare a notebook for distribution.
///
/// Removes Quarto notebook metadata, raw YAML front matter cells, empty code
/// cells and reference sections left from an earlier render (unless they
/// hold the `::: {#refs}` marker). Code cells declaring `echo: false` get a
/// Colab form header and hidden source. `<style scoped>` in HTML outputs
/// becomes `<style>`.
///
/// The `#|` option lines themselves are kept here, since the registry scan
/// reads labels from them; [`process_notebook`] removes them afterwards.
pub fn clean(notebook: &mut Notebook) {
    if let Value::Object(metadata) = &mut notebook.metadata {
        for key in QUARTO_METADATA_KEYS {
            metadata.remove(*key);
        }
    }

    let before = notebook.cells.len();
    notebook.cells.retain(|cell| match cell.kind {
        CellKind::Raw => !cell.source.trim_start().starts_with("---"),
        CellKind::Code => !cell.source.trim().is_empty(),
        CellKind::Markdown => {
            is_generated(cell, "references")
                || !REF_SECTION.is_match(&cell.source)
                || REFS_MARKER.is_match(&cell.source)
        }
    });

    for cell in &mut notebook.cells {
        if cell.kind != CellKind::Code {
            continue;
        }
        if ECHO_FALSE.is_match(&cell.source) {
            hide_source(cell);
        }
        unscope_styles(cell);
    }

    tracing::debug!(removed = before - notebook.cells.len(), "Cleaned notebook");
}

/// Collapse a code cell in Colab and Jupyter.
fn hide_source(cell: &mut Cell) {
    let body: String = cell
        .source
        .split_inclusive('\n')
        .filter(|line| !line.trim_start().starts_with("# @title"))
        .collect();
    cell.source = format!("{}\n{}", FORM_HEADER, body);

    cell.set_metadata("cellView", Value::from("form"));
    let mut jupyter = cell
        .metadata()
        .and_then(|m| m.get("jupyter"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    jupyter.insert("source_hidden".to_string(), Value::Bool(true));
    cell.set_metadata("jupyter", Value::Object(jupyter));
}

/// Replace `<style scoped>` in the `text/html` outputs of a code cell.
fn unscope_styles(cell: &mut Cell) {
    let Some(Value::Array(outputs)) = cell.extra.get_mut("outputs") else {
        return;
    };
    for output in outputs {
        let Some(html) = output.get_mut("data").and_then(|data| data.get_mut("text/html")) else {
            continue;
        };
        match html {
            Value::String(text) => *text = text.replace("<style scoped>", "<style>"),
            Value::Array(lines) => {
                for line in lines {
                    if let Value::String(text) = line {
                        *text = text.replace("<style scoped>", "<style>");
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_generated(cell: &Cell, role: &str) -> bool {
    cell.metadata()
        .and_then(|m| m.get(config::METADATA_KEY))
        .and_then(|a| a.get("generated"))
        .and_then(Value::as_str)
        == Some(role)
}

fn is_caption_for(cell: &Cell, id: &str) -> bool {
    is_generated(cell, "caption")
        && cell
            .metadata()
            .and_then(|m| m.get(config::METADATA_KEY))
            .and_then(|a| a.get("id"))
            .and_then(Value::as_str)
            == Some(id)
}

/// A valid nbformat cell id: `[A-Za-z0-9_-]{1,64}`.
fn generated_id(role: &str, id: &str) -> String {
    let raw = format!("annotate-{}-{}", role, id);
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .take(64)
        .collect()
}
