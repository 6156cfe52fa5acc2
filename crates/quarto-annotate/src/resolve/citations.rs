/*
 * resolve/citations.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Stage resolving author-date citations.
 */

//! Citation resolution.
//!
//! Bracketed groups `[@han2008; -@tan2009, p. 12]` become one grouped
//! parenthetical citation; a bare `@tan2009` becomes a narrative citation.
//! Items are separated by `;`, or by `,` when the next item starts with
//! `@`. A bracket is only a citation group when every item is a citation
//! item, so `[contact me@host.org]` stays text. Cross-reference tags such as
//! `@sec-intro` are never citations and are left in place.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::citation::{CitationFormatter, CiteItem};
use crate::syntax;

use super::crossref::BRACKET;
use super::{Stage, StageContext};

/// `@key`, `-@key` or `@key, locator`. A locator never starts with `@`.
static BRACKET_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?@([\w:.#$%&+~/-]*\w)(?:\s*,\s*([^@\s].*?))?$")
        .expect("Invalid regex pattern for citation items")
});

/// `@key` not preceded by a word character or by `@ [ ] / . :`.
static BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w@\[\]/.:])@([\w:.#$%&+~/-]*\w)")
        .expect("Invalid regex pattern for bare citations")
});

/// Rewrites citation markers to author-date text.
pub struct CitationStage;

impl Stage for CitationStage {
    fn name(&self) -> &str {
        "citations"
    }

    fn apply(&self, text: &str, ctx: &mut StageContext<'_>) -> String {
        let bibliography = ctx.bibliography;
        let formatter = CitationFormatter::new(bibliography, ctx.lang);

        let text = BRACKET.replace_all(text, |caps: &Captures| {
            if caps.get(2).is_some() {
                return caps[0].to_string();
            }
            match parse_group(&caps[1]) {
                Some(items) => {
                    for item in &items {
                        record(&item.key, ctx);
                    }
                    formatter.grouped(&items)
                }
                None => caps[0].to_string(),
            }
        });

        BARE.replace_all(&text, |caps: &Captures| {
            if syntax::is_crossref_tag(&caps[2]) {
                return caps[0].to_string();
            }
            record(&caps[2], ctx);
            format!("{}{}", &caps[1], formatter.narrative(&caps[2]))
        })
        .into_owned()
    }
}

fn parse_group(body: &str) -> Option<Vec<CiteItem>> {
    split_items(body)
        .iter()
        .map(|item| {
            let caps = BRACKET_ITEM.captures(item.trim())?;
            if syntax::is_crossref_tag(&caps[2]) {
                return None;
            }
            let mut cite = CiteItem::new(&caps[2]);
            if caps.get(1).is_some() {
                cite = cite.suppressing_author();
            }
            if let Some(locator) = caps.get(3) {
                cite = cite.with_locator(locator.as_str());
            }
            Some(cite)
        })
        .collect()
}

/// Split on `;`, and on `,` where the text after it starts a new `@` or
/// `-@` item. Other commas belong to the current item's locator.
fn split_items(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    for part in body.split(';') {
        let mut current: Option<String> = None;
        for piece in part.split(',') {
            let head = piece.trim_start();
            let starts_item = head.strip_prefix('-').unwrap_or(head).starts_with('@');
            if starts_item || current.is_none() {
                items.extend(current.replace(piece.to_string()));
            } else if let Some(item) = current.as_mut() {
                item.push(',');
                item.push_str(piece);
            }
        }
        items.extend(current);
    }
    items
}

fn record(key: &str, ctx: &mut StageContext<'_>) {
    if ctx.bibliography.contains(key) {
        ctx.report.record_citation(key);
    } else {
        tracing::warn!(key = %key, "Citation key not found in bibliography");
        ctx.report.record_unresolved_citation(key);
    }
}
