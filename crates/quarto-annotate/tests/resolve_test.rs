/*
 * tests/resolve_test.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests for notebook annotation resolution.
 */

use quarto_annotate::{
    AnnotateConfig, Bibliography, Cell, DocumentOptions, Notebook, ProcessedDocument,
    process_file, process_notebook,
};

const BIB: &str = r#"
@book{tan2009,
  author = {Tan, M. and Steinbach, M. and Kumar, V.},
  title = {Introduction to Data Mining},
  publisher = {Pearson},
  year = {2009}
}

@book{han2008,
  author = {Han, Jiawei and Kamber, Micheline},
  title = {Data Mining: Concepts and Techniques},
  publisher = {Morgan Kaufmann},
  year = {2008}
}

@article{solo2010,
  author = {Tan, M.},
  title = {A Single Author},
  journal = {Journal},
  year = {2009}
}
"#;

fn process(cells: Vec<Cell>) -> ProcessedDocument {
    process_notebook(
        Notebook::new(cells),
        &Bibliography::parse(BIB),
        &AnnotateConfig::default(),
    )
}

fn sources(notebook: &Notebook) -> Vec<String> {
    notebook.cells.iter().map(|c| c.source.clone()).collect()
}

#[test]
fn test_narrative_citations() {
    let doc = process(vec![Cell::markdown("Segundo @solo2010 e @tan2009.")]);
    assert_eq!(
        doc.notebook.cells[0].source,
        "Segundo Tan (2009) e Tan et al. (2009)."
    );
    assert_eq!(doc.report.cited, vec!["solo2010", "tan2009"]);
}

#[test]
fn test_grouped_citation() {
    let doc = process(vec![Cell::markdown("Mineração [@han2008; @tan2009].")]);
    assert_eq!(
        doc.notebook.cells[0].source,
        "Mineração (HAN; KAMBER, 2008; TAN et al., 2009)."
    );
}

#[test]
fn test_unknown_citation_is_visible() {
    let doc = process(vec![Cell::markdown("Veja @ghost2099.")]);
    assert_eq!(doc.notebook.cells[0].source, "Veja ?ghost2099.");
    assert_eq!(doc.report.unresolved_citations, vec!["ghost2099"]);
    assert!(doc.report.has_unresolved());
    // nothing known was cited, so no reference list is appended
    assert_eq!(doc.notebook.cells.len(), 1);
}

#[test]
fn test_section_headings_and_tags() {
    let doc = process(vec![Cell::markdown(
        "## Introdução {#sec-intro}\n\nVer @sec-intro e [@han2008, @tan2009].",
    )]);
    let out = sources(&doc.notebook);
    assert_eq!(
        out[0],
        "## Introdução\n\nVer @sec-intro e (HAN; KAMBER, 2008; TAN et al., 2009)."
    );
    assert!(!doc.report.has_unresolved());
    assert_eq!(doc.report.cited, vec!["han2008", "tan2009"]);
}

#[test]
fn test_marker_cell_becomes_reference_list() {
    let doc = process(vec![
        Cell::markdown("Segundo @solo2010."),
        Cell::markdown("# Fim\n\nTexto final.\n\n::: {#refs}\n:::"),
    ]);
    let out = sources(&doc.notebook);
    assert_eq!(out.len(), 2);
    assert!(out[1].starts_with("## Referências\n\nTAN, M."));
    assert!(!out[1].contains("Texto final"));
}

#[test]
fn test_forward_reference_to_equation() {
    let doc = process(vec![
        Cell::markdown("Como mostra @eq-1-1, a soma é constante."),
        Cell::markdown("$$ x=1 $$ {#eq-1-1}"),
    ]);
    let out = sources(&doc.notebook);
    assert_eq!(
        out[0],
        "Como mostra [Equação 1.1](#eq-1-1), a soma é constante."
    );
    assert!(out[1].starts_with("<a id=\"eq-1-1\"></a>"));
    assert!(out[1].contains("\\tag{1.1}"));
    assert!(!doc.report.has_unresolved());
}

#[test]
fn test_figure_reference_forms() {
    let doc = process(vec![
        Cell::markdown("Ver @fig-2-map, [-@fig-2-map] e [Fig. @fig-2-map]."),
        Cell::markdown("![Mapa](img/map.png){#fig-2-map}"),
    ]);
    assert_eq!(
        doc.notebook.cells[0].source,
        "Ver [Figura 2.1](#fig-2-map), [2.1](#fig-2-map) e [Fig. 2.1](#fig-2-map)."
    );
    assert_eq!(doc.images, vec!["img/map.png"]);
    assert_eq!(doc.elements, 1);
}

#[test]
fn test_callout_with_nested_div() {
    let text = "::: {.callout-tip}\n## Lembrete\n\nLeia @tan2009.\n\n::: {.aside}\nTexto interno\n:::\n:::";
    let doc = process(vec![Cell::markdown(text)]);
    let out = &doc.notebook.cells[0].source;
    assert!(out.starts_with("<div class=\"callout callout-tip\""));
    assert!(out.contains("Lembrete"));
    assert!(out.contains("Tan et al. (2009)"));
    assert!(out.contains("Texto interno"));
    assert!(!out.contains(":::"), "fence residue in {out}");
    assert!(out.trim_end().ends_with("</div>"));
}

#[test]
fn test_code_cell_caption_injected() {
    let doc = process(vec![
        Cell::markdown("Resultado em @fig-1-plot."),
        Cell::code("#| label: fig-1-plot\n#| fig-cap: \"Distribuição\"\nplot(x)"),
    ]);
    let out = sources(&doc.notebook);
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], "Resultado em [Figura 1.1](#fig-1-plot).");
    assert_eq!(out[1], "plot(x)");
    assert_eq!(
        out[2],
        "<a id=\"fig-1-plot\"></a>\n\n**Figura 1.1:** Distribuição"
    );
}

#[test]
fn test_second_pass_changes_nothing() {
    let cells = vec![
        Cell::markdown("# Capítulo 1\n\nVer @fig-1-a, @eq-1-1 e [@han2008; @tan2009, p. 10]."),
        Cell::markdown("![Amostra](a.png){#fig-1-a}\n\n$$ x=1 $$ {#eq-1-1}"),
        Cell::markdown("::: {.callout-note}\nUse `@decorator` e @solo2010.\n:::"),
        Cell::code("#| label: fig-1-plot\n#| fig-cap: \"Curva\"\nplot(x)"),
        Cell::markdown("| a | b |\n|---|---|\n| 1 | 2 |\n\n: Valores {#tbl-1-v}"),
    ];
    let first = process(cells);
    assert!(!first.report.has_unresolved());

    let second = process_notebook(
        first.notebook.clone(),
        &Bibliography::parse(BIB),
        &AnnotateConfig::default(),
    );
    assert_eq!(sources(&second.notebook), sources(&first.notebook));
    assert!(second.report.cited.is_empty());
    assert!(!second.report.has_unresolved());
}

#[test]
fn test_process_file_with_project_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("refs.bib"), BIB).unwrap();
    std::fs::write(
        dir.path().join("_annotate.yml"),
        "lang: en\nbibliography: refs.bib\n",
    )
    .unwrap();

    let notebook = Notebook::new(vec![
        Cell::markdown("As @tan2009 show in @tbl-1-v."),
        Cell::markdown("| a |\n|---|\n| 1 |\n\n: Values {#tbl-1-v}"),
    ]);
    let path = dir.path().join("chapter.ipynb");
    notebook.write(&path).unwrap();

    let doc = process_file(&path, &DocumentOptions::default()).unwrap();
    let out = sources(&doc.notebook);
    assert_eq!(out[0], "As Tan et al. (2009) show in [Table 1.1](#tbl-1-v).");
    assert!(out[1].contains("**Table 1.1:** Values"));
    assert!(out.last().unwrap().starts_with("## References\n\nTAN, M.; STEINBACH, M.; KUMAR, V."));
}

#[test]
fn test_process_file_missing_bibliography_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chapter.ipynb");
    let mut notebook = Notebook::new(vec![Cell::markdown("@tan2009")]);
    notebook.metadata = serde_json::json!({"annotate": {"bibliography": "missing.bib"}});
    notebook.write(&path).unwrap();

    assert!(process_file(&path, &DocumentOptions::default()).is_err());
}
