/*
 * callout.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rendering of callout directives as decorated HTML blocks.
 */

//! Callout rendering.
//!
//! A callout in the source document looks like:
//!
//! ```markdown
//! ::: {.callout-warning}
//! ## Optional Title
//!
//! Body content with [@fig-1-map] and @tan2009.
//! :::
//! ```
//!
//! It becomes a bordered `<div>` with an icon and title header. The first
//! H1 to H4 heading of the body, wherever it sits outside code blocks, is
//! taken out and replaces the default title. A `title="..."` attribute
//! takes precedence over both; `icon=false` hides the icon.

use std::sync::LazyLock;

use regex::Regex;

use crate::attr::Attr;
use crate::config::Language;
use crate::html;
use crate::mask;

/// `## Title`, minus a closing `#` run and a trailing `{#id .class}`.
static TITLE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}#{1,4}[ \t]+(.*?)(?:[ \t]*\{[#.-][^{}]*\})?(?:[ \t]+#+)?[ \t]*$")
        .expect("Invalid regex pattern for callout titles")
});

/// Known callout styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutStyle {
    Note,
    Tip,
    Warning,
    Caution,
    Important,
}

impl CalloutStyle {
    /// Style for the suffix of a `callout-*` class. Unknown suffixes are not
    /// callouts.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "note" => Some(Self::Note),
            "tip" => Some(Self::Tip),
            "warning" => Some(Self::Warning),
            "caution" => Some(Self::Caution),
            "important" => Some(Self::Important),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Tip => "tip",
            Self::Warning => "warning",
            Self::Caution => "caution",
            Self::Important => "important",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Note => "ℹ️",
            Self::Tip => "💡",
            Self::Warning => "⚠️",
            Self::Caution => "🔥",
            Self::Important => "❗",
        }
    }

    /// Accent color of the border.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Note => "#0d6efd",
            Self::Tip => "#198754",
            Self::Warning => "#ffc107",
            Self::Caution => "#fd7e14",
            Self::Important => "#dc3545",
        }
    }

    /// Default title.
    pub fn title(&self, lang: Language) -> &'static str {
        match (self, lang) {
            (Self::Note, Language::Portuguese) => "Nota",
            (Self::Note, Language::English) => "Note",
            (Self::Tip, Language::Portuguese) => "Dica",
            (Self::Tip, Language::English) => "Tip",
            (Self::Warning, Language::Portuguese) => "Atenção",
            (Self::Warning, Language::English) => "Warning",
            (Self::Caution, Language::Portuguese) => "Cuidado",
            (Self::Caution, Language::English) => "Caution",
            (Self::Important, Language::Portuguese) => "Importante",
            (Self::Important, Language::English) => "Important",
        }
    }
}

/// Render a callout whose nested directives were already expanded.
///
/// `resolve` rewrites dialect markers in the body before it is wrapped.
pub fn render(
    style: &CalloutStyle,
    attr: &Attr,
    body: &str,
    lang: Language,
    resolve: &mut dyn FnMut(&str) -> String,
) -> String {
    let (heading, body) = split_title(body);
    let title = attr
        .get("title")
        .map(str::to_string)
        .or(heading)
        .unwrap_or_else(|| style.title(lang).to_string());
    let show_icon = attr.get("icon").is_none_or(|v| v != "false");

    let title_html = html::inline(&resolve(&title));
    let header = if show_icon {
        format!("<p><strong>{} {}</strong></p>", style.icon(), title_html)
    } else {
        format!("<p><strong>{}</strong></p>", title_html)
    };

    let mut parts = vec![
        format!(
            "<div class=\"callout callout-{}\" style=\"border-left: 4px solid {}; padding: 0.5em 1em; margin: 1em 0;\">",
            style.as_str(),
            style.color()
        ),
        header,
    ];
    let body_html = html::blocks(&resolve(&body));
    if !body_html.is_empty() {
        parts.push(body_html);
    }
    parts.push("</div>".to_string());
    parts.join("\n")
}

/// Take the first title heading out of the body.
fn split_title(body: &str) -> (Option<String>, String) {
    let lines: Vec<&str> = body.split('\n').collect();
    let mut fence: Option<(char, usize)> = None;
    for (i, line) in lines.iter().enumerate() {
        if let Some(open) = fence {
            if mask::closes_code_fence(line, open) {
                fence = None;
            }
            continue;
        }
        if let Some(open) = mask::code_fence(line) {
            fence = Some(open);
            continue;
        }
        if let Some(caps) = TITLE_HEADING.captures(line) {
            let title = caps[1].to_string();
            let rest: Vec<&str> = lines[..i].iter().chain(&lines[i + 1..]).copied().collect();
            return (Some(title), rest.join("\n"));
        }
    }
    (None, body.to_string())
}
