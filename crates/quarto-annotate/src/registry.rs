/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Document-wide registry of numbered figures, tables and equations.
 */

//! Element registry.
//!
//! The registry is built by a single forward scan over every content unit of
//! a document, before any rewriting happens, so that references to elements
//! defined later in the document still resolve.
//!
//! Numbering is global per kind and never reset: the fifth figure of the
//! document is number 5 whatever chapter it belongs to. When an id carries a
//! chapter numeral (`fig-3-map`) the number is prefixed with it (`3.5`); the
//! prefix is cosmetic and taken from the id, not from document position.
//!
//! Once built, the registry is only read.

use std::collections::HashMap;

use hashlink::LinkedHashMap;

use crate::config::Language;
use crate::fenced::{self, FencedBlock};
use crate::mask::MaskedText;
use crate::notebook::{Cell, CellKind};
use crate::syntax;

/// Kind of a numbered element, derived from its id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Figure,
    Table,
    Equation,
}

impl ElementKind {
    /// Kind for an id such as `fig-1-map`, if the prefix is a
    /// cross-reference tag.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.split('-').next()? {
            "fig" => Some(Self::Figure),
            "tbl" => Some(Self::Table),
            "eq" => Some(Self::Equation),
            _ => None,
        }
    }

    /// Human-readable label (`Figura`, `Table`, ...).
    pub fn label(&self, lang: Language) -> &'static str {
        match self {
            Self::Figure => lang.figure_label(),
            Self::Table => lang.table_label(),
            Self::Equation => lang.equation_label(),
        }
    }
}

/// Where an element was defined; selects the renderer and caption source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// `![caption](path){#fig-x}`
    InlineImage,
    /// Pipe table with a `: caption {#tbl-x}` line.
    MarkdownTable,
    /// `$$ ... $$ {#eq-x}`
    EquationBlock,
    /// Code cell with a `#| label:` directive.
    CodeCell,
    /// `::: {#fig-x layout-ncol=2}` fenced group.
    GroupedBlock,
}

/// A numbered figure, table or equation.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    /// `"<chapter>.<counter>"` or `"<counter>"`.
    pub number: String,
    pub caption: String,
    pub origin: Origin,
    /// Image path, table body or equation body. `None` for code cells.
    pub content: Option<String>,
    /// Index of the content unit holding the definition.
    pub unit_index: usize,
}

impl Element {
    /// `Figura 1.2`
    pub fn label(&self, lang: Language) -> String {
        format!("{} {}", self.kind.label(lang), self.number)
    }
}

/// A definition found by a detector, before it is numbered.
#[derive(Debug, Clone)]
pub struct Definition {
    pub id: String,
    pub kind: ElementKind,
    pub caption: String,
    pub origin: Origin,
    pub content: Option<String>,
    pub unit_index: usize,
}

/// Registry of every numbered element in one document.
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    elements: LinkedHashMap<String, Element>,
    counters: HashMap<ElementKind, usize>,
    duplicates: Vec<String>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan all cells of a document in order.
    pub fn build(cells: &[Cell]) -> Self {
        let mut registry = Self::new();
        for (index, cell) in cells.iter().enumerate() {
            match cell.kind {
                CellKind::Markdown => registry.scan_markdown(index, &cell.source),
                CellKind::Code => registry.scan_code(index, &cell.source),
                CellKind::Raw => {}
            }
        }
        tracing::debug!(
            elements = registry.len(),
            duplicates = registry.duplicates.len(),
            "Built element registry"
        );
        registry
    }

    /// Register the definitions of one markdown unit.
    ///
    /// Detectors run in a fixed precedence: image definitions, markdown
    /// tables, equations, then fenced groups.
    pub fn scan_markdown(&mut self, unit_index: usize, text: &str) {
        let masked = MaskedText::new(text);
        let text = masked.text();

        for def in syntax::image_definitions(text) {
            let Some(kind) = ElementKind::from_id(&def.id) else {
                continue;
            };
            self.assign(Definition {
                id: def.id,
                kind,
                caption: masked.restore(&def.caption),
                origin: Origin::InlineImage,
                content: Some(def.path),
                unit_index,
            });
        }

        let lines: Vec<&str> = text.split('\n').collect();
        for def in syntax::table_definitions(&lines) {
            self.assign(Definition {
                id: def.id,
                kind: ElementKind::Table,
                caption: masked.restore(&def.caption),
                origin: Origin::MarkdownTable,
                content: Some(masked.restore(&def.body)),
                unit_index,
            });
        }

        for def in syntax::equation_definitions(text) {
            self.assign(Definition {
                id: def.id,
                kind: ElementKind::Equation,
                caption: String::new(),
                origin: Origin::EquationBlock,
                content: Some(def.body),
                unit_index,
            });
        }

        self.scan_groups(unit_index, &fenced::scan_blocks(&lines), &masked);
    }

    fn scan_groups(&mut self, unit_index: usize, blocks: &[FencedBlock], masked: &MaskedText) {
        for block in blocks {
            if let Some(id) = &block.attr.id {
                if let Some(kind @ (ElementKind::Figure | ElementKind::Table)) =
                    ElementKind::from_id(id)
                {
                    self.assign(Definition {
                        id: id.clone(),
                        kind,
                        caption: masked.restore(&fenced::group_caption(&block.inner_lines)),
                        origin: Origin::GroupedBlock,
                        content: Some(masked.restore(&block.inner_lines.join("\n"))),
                        unit_index,
                    });
                }
            }
            let inner: Vec<&str> = block.inner_lines.iter().map(String::as_str).collect();
            self.scan_groups(unit_index, &fenced::scan_blocks(&inner), masked);
        }
    }

    /// Register a code cell declaring `#| label: <kind>-<id>`.
    pub fn scan_code(&mut self, unit_index: usize, source: &str) {
        let Some(label) = syntax::code_cell_label(source) else {
            return;
        };
        let Some(kind) = ElementKind::from_id(&label.id) else {
            tracing::debug!(label = %label.id, "Code cell label is not a cross-reference tag");
            return;
        };
        self.assign(Definition {
            id: label.id,
            kind,
            caption: label.caption.unwrap_or_default(),
            origin: Origin::CodeCell,
            content: None,
            unit_index,
        });
    }

    /// Number a definition and record it.
    ///
    /// The first definition of an id wins: a repeated id does not consume a
    /// number and keeps the number assigned on first sight.
    pub fn assign(&mut self, def: Definition) -> String {
        if let Some(existing) = self.elements.get(&def.id) {
            tracing::warn!(id = %def.id, "Duplicate element id; keeping the first definition");
            self.duplicates.push(def.id);
            return existing.number.clone();
        }

        let counter = self.counters.entry(def.kind).or_insert(0);
        *counter += 1;
        let number = match syntax::chapter_of(&def.id) {
            Some(chapter) => format!("{}.{}", chapter, counter),
            None => counter.to_string(),
        };

        self.elements.insert(
            def.id.clone(),
            Element {
                id: def.id,
                kind: def.kind,
                number: number.clone(),
                caption: def.caption,
                origin: def.origin,
                content: def.content,
                unit_index: def.unit_index,
            },
        );
        number
    }

    pub fn lookup(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Sequence number of `id`, if registered.
    pub fn number(&self, id: &str) -> Option<&str> {
        self.elements.get(id).map(|e| e.number.as_str())
    }

    /// The element defined by the code cell at `unit_index`, if any.
    pub fn code_cell_element(&self, unit_index: usize) -> Option<&Element> {
        self.elements
            .values()
            .find(|e| e.origin == Origin::CodeCell && e.unit_index == unit_index)
    }

    /// Elements in scan order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// Ids that were defined more than once.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Number to show for an id missing from the registry: its chapter numeral
/// when it has one, otherwise the raw id.
pub fn fallback_number(id: &str) -> String {
    syntax::chapter_of(id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}
