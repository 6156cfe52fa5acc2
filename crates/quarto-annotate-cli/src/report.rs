/*
 * report.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Per-document results and the batch summary.
 */

use colored::Colorize;
use quarto_annotate::ProcessedDocument;
use serde::Serialize;
use std::path::Path;

/// Outcome of processing one notebook.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileReport {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    pub elements: usize,
    pub cited: Vec<String>,
    pub unresolved_citations: Vec<String>,
    pub unresolved_references: Vec<String>,
    pub duplicate_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_images: Vec<String>,
    pub images_copied: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn from_document(path: &Path, document: &ProcessedDocument) -> Self {
        Self {
            file_path: path.display().to_string(),
            elements: document.elements,
            cited: document.report.cited.clone(),
            unresolved_citations: document.report.unresolved_citations.clone(),
            unresolved_references: document.report.unresolved_references.clone(),
            duplicate_ids: document.duplicates.clone(),
            ..Self::default()
        }
    }

    pub fn failed(path: &Path, error: &anyhow::Error) -> Self {
        Self {
            file_path: path.display().to_string(),
            error: Some(format!("{:#}", error)),
            ..Self::default()
        }
    }

    pub fn has_unresolved(&self) -> bool {
        !self.unresolved_citations.is_empty() || !self.unresolved_references.is_empty()
    }

    /// Print the per-file lines for human-readable output.
    pub fn print(&self) {
        if let Some(error) = &self.error {
            eprintln!("  {} {}: {}", "✗".red(), self.file_path, error);
            return;
        }

        let mark = if self.has_unresolved() {
            "!".yellow()
        } else {
            "✓".green()
        };
        match &self.output_path {
            Some(output) => println!("  {} {} -> {}", mark, self.file_path, output.cyan()),
            None => println!("  {} {}", mark, self.file_path),
        }
        for key in &self.unresolved_citations {
            println!("      unresolved citation: {}", key.yellow());
        }
        for id in &self.unresolved_references {
            println!("      unresolved reference: {}", id.yellow());
        }
        for id in &self.duplicate_ids {
            println!("      duplicate id: {}", id.yellow());
        }
        for image in &self.missing_images {
            println!("      missing image: {}", image.yellow());
        }
    }
}

pub fn print_summary(reports: &[FileReport]) {
    let total = reports.len();
    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    let unresolved = reports.iter().filter(|r| r.has_unresolved()).count();
    let clean = total - failed - unresolved;
    let elements: usize = reports.iter().map(|r| r.elements).sum();
    let citations: usize = reports.iter().map(|r| r.cited.len()).sum();
    let images: usize = reports.iter().map(|r| r.images_copied).sum();

    println!("\n{}", "=== Summary ===".bold());
    println!("Total files:         {}", total);
    println!(
        "Failed:              {} {}",
        failed,
        if failed > 0 { "✗".red() } else { "✓".green() }
    );
    println!(
        "With unresolved:     {} {}",
        unresolved,
        if unresolved > 0 { "!".yellow() } else { "✓".green() }
    );
    println!("Clean files:         {} {}", clean, "✓".green());
    println!("\nNumbered elements:   {}", elements);
    println!("Distinct citations:  {}", citations);
    if images > 0 {
        println!("Images copied:       {}", images);
    }
}
