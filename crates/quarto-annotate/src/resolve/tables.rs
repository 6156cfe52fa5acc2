/*
 * resolve/tables.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage rendering captioned markdown tables.
 */

use crate::registry::ElementKind;
use crate::syntax;

use super::{Stage, StageContext};

/// Rewrites a pipe table with a `: caption {#tbl-x}` line to an anchor, a
/// bold `Tabela n:` caption, and the table rows.
pub struct TableStage;

impl Stage for TableStage {
    fn name(&self) -> &str {
        "tables"
    }

    fn apply(&self, text: &str, ctx: &mut StageContext<'_>) -> String {
        let lines: Vec<&str> = text.split('\n').collect();
        let definitions = syntax::table_definitions(&lines);
        if definitions.is_empty() {
            return text.to_string();
        }

        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        let mut next = 0;
        for def in definitions {
            out.extend(lines[next..def.lines.start].iter().map(|l| l.to_string()));
            let (label, number) = ctx.element_label(&def.id, ElementKind::Table);
            let caption = if def.caption.is_empty() {
                format!("**{} {}**", label, number)
            } else {
                format!("**{} {}:** {}", label, number, def.caption)
            };
            out.push(format!("<a id=\"{}\"></a>\n\n{}\n\n{}", def.id, caption, def.body));
            next = def.lines.end;
        }
        out.extend(lines[next..].iter().map(|l| l.to_string()));
        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibliography::Bibliography;
    use crate::config::Language;
    use crate::notebook::Cell;
    use crate::registry::ElementRegistry;
    use crate::resolve::ResolveReport;

    fn run(registry: &ElementRegistry, lang: Language, text: &str) -> String {
        let bibliography = Bibliography::new();
        let mut report = ResolveReport::default();
        let mut ctx = StageContext {
            registry,
            bibliography: &bibliography,
            lang,
            report: &mut report,
        };
        TableStage.apply(text, &mut ctx)
    }

    #[test]
    fn test_captioned_table() {
        let text = "Intro\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n: Results {#tbl-3-results}\n\nAfter";
        let registry = ElementRegistry::build(&[Cell::markdown(text)]);
        assert_eq!(
            run(&registry, Language::Portuguese, text),
            "Intro\n\n<a id=\"tbl-3-results\"></a>\n\n**Tabela 3.1:** Results\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\nAfter"
        );
    }

    #[test]
    fn test_bare_id_has_no_caption_text() {
        let text = "| a |\n|---|\n{#tbl-plain}";
        let registry = ElementRegistry::build(&[Cell::markdown(text)]);
        assert_eq!(
            run(&registry, Language::English, text),
            "<a id=\"tbl-plain\"></a>\n\n**Table 1**\n\n| a |\n|---|"
        );
    }

    #[test]
    fn test_plain_table_untouched() {
        let text = "| a |\n|---|\n| 1 |";
        assert_eq!(run(&ElementRegistry::new(), Language::Portuguese, text), text);
    }
}
