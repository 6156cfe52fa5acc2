/*
 * tests/cli_test.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests for the quarto-annotate binary.
 */

use std::path::Path;
use std::process::{Command, Output};

const BIB: &str = "@book{tan2009, author = {Tan, M. and Steinbach, M. and Kumar, V.}, title = {Introduction to Data Mining}, publisher = {Pearson}, year = {2009}}\n";

fn notebook(cells: &[&str]) -> String {
    let cells: Vec<serde_json::Value> = cells
        .iter()
        .map(|source| {
            serde_json::json!({
                "cell_type": "markdown",
                "metadata": {},
                "source": source,
            })
        })
        .collect();
    serde_json::json!({
        "cells": cells,
        "metadata": {},
        "nbformat": 4,
        "nbformat_minor": 5,
    })
    .to_string()
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quarto-annotate"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run quarto-annotate")
}

fn read_sources(path: &Path) -> Vec<String> {
    let text = std::fs::read_to_string(path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    value["cells"]
        .as_array()
        .unwrap()
        .iter()
        .map(|cell| match &cell["source"] {
            serde_json::Value::Array(lines) => {
                lines.iter().filter_map(|l| l.as_str()).collect::<String>()
            }
            other => other.as_str().unwrap_or_default().to_string(),
        })
        .collect()
}

#[test]
fn test_render_writes_dist_notebook() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("refs.bib"), BIB).unwrap();
    std::fs::write(
        dir.path().join("cap01.ipynb"),
        notebook(&["Segundo @tan2009, veja @fig-1-a.", "![Amostra](img/a.png){#fig-1-a}"]),
    )
    .unwrap();

    let output = run(dir.path(), &["render", "cap01.ipynb", "--bib", "refs.bib"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let sources = read_sources(&dir.path().join("cap01_dist.ipynb"));
    assert_eq!(
        sources[0],
        "Segundo Tan et al. (2009), veja [Figura 1.1](#fig-1-a)."
    );
    assert!(sources.last().unwrap().starts_with("## Referências"));
    // the input is left untouched
    assert!(read_sources(&dir.path().join("cap01.ipynb"))[0].contains("@tan2009"));
}

#[test]
fn test_render_copies_images_to_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("img")).unwrap();
    std::fs::write(dir.path().join("img/a.png"), b"png").unwrap();
    std::fs::write(
        dir.path().join("cap01.ipynb"),
        notebook(&["![Amostra](img/a.png){#fig-1-a}"]),
    )
    .unwrap();

    let output = run(
        dir.path(),
        &["render", "cap01.ipynb", "--output-dir", "dist", "--copy-images", "--json"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(dir.path().join("dist/cap01_dist.ipynb").is_file());
    assert_eq!(std::fs::read(dir.path().join("dist/img/a.png")).unwrap(), b"png");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(line["images_copied"], 1);
    assert_eq!(line["elements"], 1);
}

#[test]
fn test_render_english_labels() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ch.ipynb"),
        notebook(&["See @tbl-2-x.", "| a |\n|---|\n| 1 |\n\n: Values {#tbl-2-x}"]),
    )
    .unwrap();

    let output = run(dir.path(), &["render", "ch.ipynb", "--lang", "en", "--suffix", "_out"]);
    assert!(output.status.success());
    let sources = read_sources(&dir.path().join("ch_out.ipynb"));
    assert_eq!(sources[0], "See [Table 2.1](#tbl-2-x).");
}

#[test]
fn test_render_refuses_to_overwrite_input() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ipynb"), notebook(&["text"])).unwrap();

    let output = run(dir.path(), &["render", "a.ipynb", "--suffix", ""]);
    assert!(!output.status.success());
    assert_eq!(read_sources(&dir.path().join("a.ipynb")), vec!["text"]);
}

#[test]
fn test_batch_continues_after_invalid_notebook() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.ipynb"), "not json").unwrap();
    std::fs::write(dir.path().join("good.ipynb"), notebook(&["ok"])).unwrap();

    let output = run(dir.path(), &["render", "*.ipynb", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(dir.path().join("good_dist.ipynb").is_file());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let reports: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().any(|r| r.get("error").is_some()));
}

#[test]
fn test_check_reports_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ipynb"), notebook(&["Veja @ghost2099 e @fig-9-x."])).unwrap();

    let output = run(dir.path(), &["check", "a.ipynb", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("a_dist.ipynb").exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(report["unresolved_citations"][0], "ghost2099");
    assert_eq!(report["unresolved_references"][0], "fig-9-x");
}

#[test]
fn test_check_clean_document_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ipynb"), notebook(&["Nada a resolver."])).unwrap();

    let output = run(dir.path(), &["check", "a.ipynb"]);
    assert!(output.status.success());
}
