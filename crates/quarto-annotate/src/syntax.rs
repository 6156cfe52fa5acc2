/*
 * syntax.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Surface syntax of element definitions.
 */

//! Surface syntax of element definitions.
//!
//! The registry scan and the rewrite stages must agree exactly on what counts
//! as a definition, so both use the detectors in this module:
//!
//! - [`image_definitions`]: `![caption](path){#fig-ID}` / `{#tbl-ID}`
//! - [`table_definitions`]: a pipe table followed by `: caption {#tbl-ID}`
//!   or a bare `{#tbl-ID}`
//! - [`equation_definitions`]: `$$ ... $$` followed by `{#eq-ID}`
//! - [`code_cell_label`]: `#| label: fig-ID` plus `#| fig-cap: "..."`
//!
//! Grouped `::: {#fig-ID layout-ncol=2}` definitions are found by the fence
//! scanner in [`crate::fenced`].

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::attr::{self, Attr};

/// `![alt](path "title"){#fig-x key=value}`. The alt text may contain one
/// level of brackets so captions can carry citations.
static IMAGE_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"!\[((?:[^\[\]]|\[[^\[\]]*\])*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)\{(#(?:fig|tbl)-[^}]*)\}"#,
    )
    .expect("Invalid regex pattern for image definitions")
});

/// `$$ body $$` on one or more lines, followed on the same or the next line by
/// `{#eq-ID}`. The body never contains `$$`.
static EQUATION_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$((?:[^$]|\$[^$])+?)\$\$[ \t]*(?:\r?\n)?[ \t]*\{#(eq-[\w-]+)[^}]*\}")
        .expect("Invalid regex pattern for equation definitions")
});

/// `: Caption text {#tbl-ID}` below a pipe table.
static TABLE_CAPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*:\s*(.*?)\s*\{#(tbl-[\w-]+)[^}]*\}\s*$")
        .expect("Invalid regex pattern for table captions")
});

/// A bare `{#tbl-ID}` line below a pipe table.
static TABLE_BARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\{#(tbl-[\w-]+)[^}]*\}\s*$").expect("Invalid regex pattern for table ids")
});

/// `#| key: value` directive line in a code cell.
static CELL_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#\|\s*([\w-]+)\s*:\s*(.*?)\s*$")
        .expect("Invalid regex pattern for cell directives")
});

/// `<kind>-<digits>-<suffix>`: the digits are the chapter number.
static CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:fig|tbl|eq)-(\d+)-").expect("Invalid regex pattern for chapter prefix")
});

/// Prefixes of Quarto cross-reference ids. Keys carrying one are never
/// bibliography keys, even when this crate does not number their kind.
static CROSSREF_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:fig|tbl|sec|eq|lst|thm|lem|cor|prp|def|exm|exr|rem)-")
        .expect("Invalid regex pattern for cross-reference tags")
});

/// An image-based figure or table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDefinition {
    /// Byte range of the whole definition in the scanned text.
    pub span: Range<usize>,
    pub id: String,
    pub caption: String,
    pub path: String,
    pub attr: Attr,
}

/// A display equation with an `{#eq-ID}` label.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationDefinition {
    pub span: Range<usize>,
    pub id: String,
    pub body: String,
}

/// A pipe table with a caption line.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    /// Line range covering the table and its caption line.
    pub lines: Range<usize>,
    pub id: String,
    pub caption: String,
    /// The table rows, verbatim.
    pub body: String,
}

/// Label and caption declared through `#|` directives in a code cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCellLabel {
    pub id: String,
    pub caption: Option<String>,
}

pub fn image_definitions(text: &str) -> Vec<ImageDefinition> {
    IMAGE_DEFINITION
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let attr = Attr::parse(&caps[3]);
            Some(ImageDefinition {
                span: whole.range(),
                id: attr.id.clone()?,
                caption: caps[1].trim().to_string(),
                path: caps[2].to_string(),
                attr,
            })
        })
        .collect()
}

pub fn equation_definitions(text: &str) -> Vec<EquationDefinition> {
    EQUATION_DEFINITION
        .captures_iter(text)
        .filter_map(|caps| {
            Some(EquationDefinition {
                span: caps.get(0)?.range(),
                id: caps[2].to_string(),
                body: caps[1].trim().to_string(),
            })
        })
        .collect()
}

/// Find captioned pipe tables in `lines`.
///
/// The caption line must follow the last table row directly or after a
/// single blank line.
pub fn table_definitions(lines: &[&str]) -> Vec<TableDefinition> {
    let mut tables = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !is_table_row(lines[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < lines.len() && is_table_row(lines[i]) {
            i += 1;
        }
        let rows_end = i;

        let caption_line = if i < lines.len() && lines[i].trim().is_empty() {
            i + 1
        } else {
            i
        };
        let Some(line) = lines.get(caption_line) else {
            continue;
        };

        let found = if let Some(caps) = TABLE_CAPTION.captures(line) {
            Some((caps[2].to_string(), caps[1].to_string()))
        } else {
            TABLE_BARE_ID
                .captures(line)
                .map(|caps| (caps[1].to_string(), String::new()))
        };

        if let Some((id, caption)) = found {
            tables.push(TableDefinition {
                lines: start..caption_line + 1,
                id,
                caption,
                body: lines[start..rows_end].join("\n"),
            });
            i = caption_line + 1;
        }
    }

    tables
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

/// Read `#| label:` and `#| <kind>-cap:` directives from a code cell.
pub fn code_cell_label(source: &str) -> Option<CodeCellLabel> {
    let mut label = None;
    let mut captions = Vec::new();

    for line in source.lines() {
        let Some(caps) = CELL_DIRECTIVE.captures(line) else {
            continue;
        };
        let value = attr::unquote(&caps[2]);
        match &caps[1] {
            "label" => {
                if label.is_none() {
                    label = Some(value);
                }
            }
            key if key.ends_with("-cap") => captions.push((key.to_string(), value)),
            _ => {}
        }
    }

    let id = label?;
    let prefix = id.split('-').next().unwrap_or_default();
    let caption = captions
        .into_iter()
        .find(|(key, _)| key.strip_suffix("-cap") == Some(prefix))
        .map(|(_, value)| value);
    Some(CodeCellLabel { id, caption })
}

/// Remove the `label` and `*-cap` directive lines from a code cell.
pub fn strip_label_directives(source: &str) -> String {
    source
        .split_inclusive('\n')
        .filter(|line| match CELL_DIRECTIVE.captures(line) {
            Some(caps) => &caps[1] != "label" && !caps[1].ends_with("-cap"),
            None => true,
        })
        .collect()
}

/// Remove every `#|` option line from a code cell, then leading blank lines.
pub fn strip_cell_directives(source: &str) -> String {
    let kept: String = source
        .split_inclusive('\n')
        .filter(|line| !line.trim_start().starts_with("#|"))
        .collect();
    kept.trim_start_matches(['\n', '\r']).to_string()
}

/// Chapter numeral embedded in an element id, if any.
pub fn chapter_of(id: &str) -> Option<&str> {
    CHAPTER
        .captures(id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Whether `key` (without the `@`) names a cross-reference such as
/// `sec-intro` or `thm-main` rather than a citation.
pub fn is_crossref_tag(key: &str) -> bool {
    CROSSREF_TAG.is_match(key)
}
