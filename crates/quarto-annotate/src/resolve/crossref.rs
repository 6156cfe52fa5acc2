/*
 * resolve/crossref.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage resolving cross-references to numbered elements.
 */

//! Cross-reference resolution.
//!
//! | marker           | output                    |
//! |------------------|---------------------------|
//! | `@fig-1-a`       | `[Figura 1.1](#fig-1-a)`  |
//! | `[@fig-1-a]`     | `[Figura 1.1](#fig-1-a)`  |
//! | `[-@fig-1-a]`    | `[1.1](#fig-1-a)`         |
//! | `[Fig. @fig-1-a]`| `[Fig. 1.1](#fig-1-a)`    |
//! | `[@fig-1-a, left]`| `[Figura 1.1](#fig-1-a), left` |
//!
//! Text after the id is kept after the link. A bracket holding several
//! references separated by `;` renders each of them joined with `"; "`.
//! Brackets followed by `(` are markdown links and are left alone.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{Stage, StageContext};

/// A bracketed group holding at least one `@`, plus a following `(` if any.
pub(super) static BRACKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]]*@[^\[\]]*)\](\()?").expect("Invalid regex pattern for bracket groups")
});

/// One item of a bracketed cross-reference group: optional prefix text, the
/// id, and optional trailing text starting with whitespace or punctuation.
static BRACKET_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(.*?\S)\s+)?(-)?@((?:fig|tbl|eq)-[\w-]*\w)([^\w-].*)?$")
        .expect("Invalid regex pattern for cross-reference items")
});

/// `@fig-x` not preceded by a word character, `[`, `@` or `/`.
static BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w\[@/])@((?:fig|tbl|eq)-[\w-]*\w)")
        .expect("Invalid regex pattern for bare cross-references")
});

/// Requested rendering of one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceForm {
    /// `Figura 1.1`
    Full,
    /// `1.1`
    NumberOnly,
    /// `<prefix> 1.1`
    CustomPrefix(String),
}

/// One parsed item of a bracketed group.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BracketReference {
    id: String,
    form: ReferenceForm,
    /// Text following the id, leading whitespace included.
    suffix: Option<String>,
}

/// Rewrites cross-references to links pointing at element anchors.
pub struct CrossrefStage;

impl Stage for CrossrefStage {
    fn name(&self) -> &str {
        "crossrefs"
    }

    fn apply(&self, text: &str, ctx: &mut StageContext<'_>) -> String {
        let text = BRACKET.replace_all(text, |caps: &Captures| {
            if caps.get(2).is_some() {
                return caps[0].to_string();
            }
            match parse_group(&caps[1]) {
                Some(items) => items
                    .iter()
                    .map(|item| {
                        let link = render(&item.id, &item.form, ctx);
                        match &item.suffix {
                            Some(suffix) => format!("{}{}", link, suffix),
                            None => link,
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
                None => caps[0].to_string(),
            }
        });

        BARE.replace_all(&text, |caps: &Captures| {
            format!("{}{}", &caps[1], render(&caps[2], &ReferenceForm::Full, ctx))
        })
        .into_owned()
    }
}

/// Split a bracket body into references, or `None` when any item is not a
/// cross-reference.
fn parse_group(body: &str) -> Option<Vec<BracketReference>> {
    body.split(';')
        .map(|item| {
            let caps = BRACKET_ITEM.captures(item.trim())?;
            let form = match (caps.get(1), caps.get(2)) {
                (_, Some(_)) => ReferenceForm::NumberOnly,
                (Some(prefix), None) => ReferenceForm::CustomPrefix(prefix.as_str().to_string()),
                (None, None) => ReferenceForm::Full,
            };
            Some(BracketReference {
                id: caps[3].to_string(),
                form,
                suffix: caps.get(4).map(|m| m.as_str().trim_end().to_string()),
            })
        })
        .collect()
}

fn render(id: &str, form: &ReferenceForm, ctx: &mut StageContext<'_>) -> String {
    let Some(element) = ctx.registry.lookup(id) else {
        tracing::warn!(id = %id, "Unresolved cross-reference");
        ctx.report.record_unresolved_reference(id);
        return match form {
            ReferenceForm::CustomPrefix(prefix) => format!("{} ?{}", prefix, id),
            _ => format!("?{}", id),
        };
    };

    let text = match form {
        ReferenceForm::Full => element.label(ctx.lang),
        ReferenceForm::NumberOnly => element.number.clone(),
        ReferenceForm::CustomPrefix(prefix) => format!("{} {}", prefix, element.number),
    };
    format!("[{}](#{})", text, id)
}
