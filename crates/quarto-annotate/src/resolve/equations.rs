/*
 * resolve/equations.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage rendering labeled display equations.
 */

use std::sync::LazyLock;

use regex::Regex;

use crate::registry::ElementKind;
use crate::syntax;

use super::{Stage, StageContext};

/// `\textcolor{color}{text}`.
static TEXTCOLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\textcolor\{([^}]+)\}\{([^}]+)\}")
        .expect("Invalid regex pattern for textcolor commands")
});

/// Rewrites `$$ body $$ {#eq-x}` to an anchor followed by the equation with
/// a `\tag{n}`. `\textcolor{c}{x}` in the body becomes `{\color{c}{x}}`.
pub struct EquationStage;

impl Stage for EquationStage {
    fn name(&self) -> &str {
        "equations"
    }

    fn apply(&self, text: &str, ctx: &mut StageContext<'_>) -> String {
        let definitions = syntax::equation_definitions(text);
        if definitions.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for def in definitions {
            let (_, number) = ctx.element_label(&def.id, ElementKind::Equation);
            let body = TEXTCOLOR.replace_all(&def.body, r"{\color{$1}{$2}}");
            out.push_str(&text[last..def.span.start]);
            out.push_str(&format!(
                "<a id=\"{}\"></a>\n$$\n{} \\tag{{{}}}\n$$",
                def.id, body, number
            ));
            last = def.span.end;
        }
        out.push_str(&text[last..]);
        out
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

    fn run(registry: &ElementRegistry, text: &str) -> String {
        let bibliography = Bibliography::new();
        let mut report = ResolveReport::default();
        let mut ctx = StageContext {
            registry,
            bibliography: &bibliography,
            lang: Language::Portuguese,
            report: &mut report,
        };
        EquationStage.apply(text, &mut ctx)
    }

    #[test]
    fn test_tagged_equation() {
        let text = "Before\n\n$$ x=1 $$ {#eq-1-1}\n\nAfter";
        let registry = ElementRegistry::build(&[Cell::markdown(text)]);
        assert_eq!(
            run(&registry, text),
            "Before\n\n<a id=\"eq-1-1\"></a>\n$$\nx=1 \\tag{1.1}\n$$\n\nAfter"
        );
    }

    #[test]
    fn test_unregistered_uses_chapter_fallback() {
        let registry = ElementRegistry::new();
        assert_eq!(
            run(&registry, "$$y$$\n{#eq-4-y}"),
            "<a id=\"eq-4-y\"></a>\n$$\ny \\tag{4}\n$$"
        );
    }

    #[test]
    fn test_textcolor_rewritten() {
        let text = "$$ \\textcolor{red}{a} + \\textcolor{blue}{b} $$ {#eq-1-c}";
        let registry = ElementRegistry::build(&[Cell::markdown(text)]);
        assert_eq!(
            run(&registry, text),
            "<a id=\"eq-1-c\"></a>\n$$\n{\\color{red}{a}} + {\\color{blue}{b}} \\tag{1.1}\n$$"
        );
    }

    #[test]
    fn test_unlabeled_math_untouched() {
        let registry = ElementRegistry::new();
        assert_eq!(run(&registry, "$$ a $$"), "$$ a $$");
    }

    #[test]
    fn test_output_is_stable() {
        let text = "$$ x=1 $$ {#eq-1-1}";
        let registry = ElementRegistry::build(&[Cell::markdown(text)]);
        let once = run(&registry, text);
        assert_eq!(run(&registry, &once), once);
    }
}
