/*
 * resolve/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Ordered rewrite stages for dialect markers.
 */

//! Reference resolution.
//!
//! This module rewrites the dialect markers of one content unit into final
//! text:
//!
//! - [`Stage`] - The trait implemented by every rewrite stage
//! - [`ResolvePipeline`] - Ordered collection of stages to execute
//! - [`Resolver`] - A pipeline bound to a registry and a bibliography
//!
//! # Stage order
//!
//! [`ResolvePipeline::standard`] runs, in this order:
//!
//! 1. [`HeadingStage`] - `## Title {#sec-x}` to `## Title`
//! 2. [`EquationStage`] - `$$ ... $$ {#eq-x}` to anchored tagged math
//! 3. [`TableStage`] - captioned pipe tables to anchored captioned tables
//! 4. [`ImageStage`] - `![cap](path){#fig-x}` to anchored captioned images
//! 5. [`CrossrefStage`] - `@fig-x`, `[-@fig-x]`... to links
//! 6. [`CitationStage`] - `@key`, `[@a; @b]` to author-date citations
//!
//! Each stage leaves no marker of its own kind behind: unknown targets are
//! rewritten to a visible `?id` fallback rather than left in place. Code
//! spans and fenced code blocks are masked for the whole run.

mod citations;
mod crossref;
mod equations;
mod headings;
mod images;
mod tables;

pub use citations::CitationStage;
pub use crossref::CrossrefStage;
pub use equations::EquationStage;
pub use headings::HeadingStage;
pub use images::ImageStage;
pub use tables::TableStage;

use crate::bibliography::Bibliography;
use crate::config::Language;
use crate::mask::MaskedText;
use crate::registry::{self, ElementKind, ElementRegistry};

/// Trait for rewrite stages.
pub trait Stage: Send + Sync {
    /// Human-readable name for this stage.
    ///
    /// Used for logging and debugging.
    fn name(&self) -> &str;

    /// Rewrite the markers this stage owns in `text`.
    fn apply(&self, text: &str, ctx: &mut StageContext<'_>) -> String;
}

/// Inputs shared by the stages of one run, plus the report they fill.
pub struct StageContext<'a> {
    pub registry: &'a ElementRegistry,
    pub bibliography: &'a Bibliography,
    pub lang: Language,
    pub report: &'a mut ResolveReport,
}

impl StageContext<'_> {
    /// `Figura 1.2` for a registered id, or the label with the fallback
    /// number for an unregistered definition.
    pub(crate) fn element_label(&self, id: &str, kind: ElementKind) -> (String, String) {
        let number = self
            .registry
            .number(id)
            .map(str::to_string)
            .unwrap_or_else(|| registry::fallback_number(id));
        (kind.label(self.lang).to_string(), number)
    }
}

/// What a resolution run cited and failed to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Known bibliography keys, in order of first citation.
    pub cited: Vec<String>,
    /// Cited keys missing from the bibliography.
    pub unresolved_citations: Vec<String>,
    /// Referenced element ids missing from the registry.
    pub unresolved_references: Vec<String>,
}

impl ResolveReport {
    pub fn record_citation(&mut self, key: &str) {
        push_unique(&mut self.cited, key);
    }

    pub fn record_unresolved_citation(&mut self, key: &str) {
        push_unique(&mut self.unresolved_citations, key);
    }

    pub fn record_unresolved_reference(&mut self, id: &str) {
        push_unique(&mut self.unresolved_references, id);
    }

    /// Whether anything failed to resolve.
    pub fn has_unresolved(&self) -> bool {
        !self.unresolved_citations.is_empty() || !self.unresolved_references.is_empty()
    }

    /// Fold another report into this one, keeping first-appearance order.
    pub fn merge(&mut self, other: ResolveReport) {
        for key in &other.cited {
            self.record_citation(key);
        }
        for key in &other.unresolved_citations {
            self.record_unresolved_citation(key);
        }
        for id in &other.unresolved_references {
            self.record_unresolved_reference(id);
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// A pipeline of rewrite stages to execute in order.
pub struct ResolvePipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl ResolvePipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// The dialect stages in their required order.
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.extend([
            Box::new(HeadingStage) as Box<dyn Stage>,
            Box::new(EquationStage),
            Box::new(TableStage),
            Box::new(ImageStage),
            Box::new(CrossrefStage),
            Box::new(CitationStage),
        ]);
        pipeline
    }

    /// Add a stage. Stages run in the order they are added.
    pub fn push(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn extend(&mut self, stages: impl IntoIterator<Item = Box<dyn Stage>>) {
        self.stages.extend(stages);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage over `text` with code regions masked.
    pub fn execute(&self, text: &str, ctx: &mut StageContext<'_>) -> String {
        let masked = MaskedText::new(text);
        let mut current = masked.text().to_string();
        for stage in &self.stages {
            tracing::debug!(stage = stage.name(), "Running stage");
            current = stage.apply(&current, ctx);
        }
        masked.restore(&current)
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Default for ResolvePipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// The standard pipeline bound to one document's registry and bibliography.
///
/// Accumulates a [`ResolveReport`] across every call to [`Resolver::resolve`].
pub struct Resolver<'a> {
    registry: &'a ElementRegistry,
    bibliography: &'a Bibliography,
    lang: Language,
    pipeline: ResolvePipeline,
    report: ResolveReport,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a ElementRegistry, bibliography: &'a Bibliography, lang: Language) -> Self {
        Self {
            registry,
            bibliography,
            lang,
            pipeline: ResolvePipeline::standard(),
            report: ResolveReport::default(),
        }
    }

    /// Rewrite every marker in `text`.
    pub fn resolve(&mut self, text: &str) -> String {
        let mut ctx = StageContext {
            registry: self.registry,
            bibliography: self.bibliography,
            lang: self.lang,
            report: &mut self.report,
        };
        self.pipeline.execute(text, &mut ctx)
    }

    pub fn report(&self) -> &ResolveReport {
        &self.report
    }

    pub fn into_report(self) -> ResolveReport {
        self.report
    }
}
