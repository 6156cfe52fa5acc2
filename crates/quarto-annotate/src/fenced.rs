/*
 * fenced.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Fenced directive (div) scanning and rendering.
 */

//! Fenced directives.
//!
//! A directive opens with a run of `L >= 3` colons followed by an attribute
//! payload and closes with a bare run of at least `L` colons:
//!
//! ```text
//! :::: {.callout-tip}
//! ## Custom title
//! ::: {.centered}
//! nested content
//! :::
//! ::::
//! ```
//!
//! [`scan_blocks`] finds the outermost directives with an explicit stack:
//! every opening fence is pushed, a closing fence pops the innermost open
//! fence when it is at least as long. Nested fence lines are kept verbatim in
//! the outer block's body. [`rewrite`] renders each outer block, invoking
//! itself again on the body so nested directives are expanded too.
//!
//! Unclosed directives are left as plain text.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::attr::Attr;
use crate::callout::{self, CalloutStyle};
use crate::config::Language;
use crate::html;
use crate::mask::{closes_code_fence, code_fence};
use crate::registry::{self, ElementKind, ElementRegistry};

/// `::: {attrs}` or `::: word`, optionally followed by more colons.
static OPEN_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(:{3,})[ \t]*(\{[^}]*\}|[^\s{}:][^\s{}]*)[ \t]*:*[ \t]*$")
        .expect("Invalid regex pattern for opening fences")
});

static CLOSE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(:{3,})[ \t]*$").expect("Invalid regex pattern for closing fences")
});

/// `![alt](src){attrs}` on a line of its own inside a group.
static GROUP_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*!\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)(\{[^}]*\})?\s*$"#)
        .expect("Invalid regex pattern for group images")
});

/// Classification of a directive by its attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Callout(CalloutStyle),
    /// Side-by-side figure or table group (id plus a `layout*` attribute).
    Group { id: String, kind: ElementKind },
    Centered,
    Generic,
}

/// One outermost fenced directive.
#[derive(Debug, Clone, PartialEq)]
pub struct FencedBlock {
    pub fence_length: usize,
    /// Raw attribute payload from the opening line.
    pub attributes: String,
    pub attr: Attr,
    /// Lines between the opening and closing fences, nested fences included.
    pub inner_lines: Vec<String>,
    pub kind: BlockKind,
    /// Line range of the block, fences included.
    pub lines: Range<usize>,
}

/// Opening fence length and payload of `line`, if it opens a directive.
fn opening(line: &str) -> Option<(usize, &str)> {
    let caps = OPEN_FENCE.captures(line)?;
    let fence = caps.get(1)?.as_str().len();
    let payload = caps.get(2)?.as_str();
    Some((fence, payload))
}

fn closing(line: &str) -> Option<usize> {
    CLOSE_FENCE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().len())
}

/// Classify a directive from its attributes.
pub fn classify(attr: &Attr) -> BlockKind {
    if let Some(style) = attr
        .classes
        .iter()
        .filter_map(|class| class.strip_prefix("callout-"))
        .find_map(CalloutStyle::from_name)
    {
        return BlockKind::Callout(style);
    }
    if let Some(id) = &attr.id {
        if let Some(kind @ (ElementKind::Figure | ElementKind::Table)) = ElementKind::from_id(id) {
            if attr.has_layout() {
                return BlockKind::Group {
                    id: id.clone(),
                    kind,
                };
            }
        }
    }
    if attr.has_class("centered") || attr.has_class("center") {
        return BlockKind::Centered;
    }
    BlockKind::Generic
}

/// Find the outermost fenced directives in `lines`.
///
/// Lines inside fenced code blocks never open or close a directive.
pub fn scan_blocks(lines: &[&str]) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut code: Option<(char, usize)> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if let Some(fence) = code {
            if closes_code_fence(line, fence) {
                code = None;
            }
            i += 1;
            continue;
        }
        if let Some(fence) = code_fence(line) {
            code = Some(fence);
            i += 1;
            continue;
        }

        let Some((fence_length, payload)) = opening(line) else {
            i += 1;
            continue;
        };
        match find_close(lines, i, fence_length) {
            Some(end) => {
                let attr = Attr::parse(payload);
                blocks.push(FencedBlock {
                    fence_length,
                    attributes: payload.to_string(),
                    kind: classify(&attr),
                    attr,
                    inner_lines: lines[i + 1..end].iter().map(|l| l.to_string()).collect(),
                    lines: i..end + 1,
                });
                i = end + 1;
            }
            None => {
                tracing::debug!(line = i + 1, "Unclosed fenced directive left as text");
                i += 1;
            }
        }
    }

    blocks
}

/// Index of the line closing the directive opened at `start`.
fn find_close(lines: &[&str], start: usize, fence_length: usize) -> Option<usize> {
    let mut stack = vec![fence_length];
    let mut code: Option<(char, usize)> = None;

    for (offset, line) in lines[start + 1..].iter().enumerate() {
        if let Some(fence) = code {
            if closes_code_fence(line, fence) {
                code = None;
            }
            continue;
        }
        if let Some(fence) = code_fence(line) {
            code = Some(fence);
            continue;
        }

        if let Some((nested, _)) = opening(line) {
            stack.push(nested);
        } else if let Some(length) = closing(line) {
            let innermost = *stack.last()?;
            if length >= innermost {
                stack.pop();
                if stack.is_empty() {
                    return Some(start + 1 + offset);
                }
            }
        }
    }
    None
}

/// Caption of a figure/table group: its last line that is neither blank nor
/// an image.
pub fn group_caption(inner_lines: &[String]) -> String {
    inner_lines
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| {
            !l.is_empty() && !GROUP_IMAGE.is_match(l) && opening(l).is_none() && closing(l).is_none()
        })
        .unwrap_or_default()
        .to_string()
}

/// Read-only inputs of block rendering.
pub struct BlockContext<'a> {
    pub registry: &'a ElementRegistry,
    pub lang: Language,
}

/// Render every fenced directive in `text`.
///
/// `resolve` rewrites references and citations in text that ends up inside
/// HTML, where the viewer would no longer interpret markdown.
pub fn rewrite(text: &str, ctx: &BlockContext<'_>, resolve: &mut dyn FnMut(&str) -> String) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let blocks = scan_blocks(&lines);
    if blocks.is_empty() {
        return text.to_string();
    }

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut next = 0;
    for block in &blocks {
        out.extend(lines[next..block.lines.start].iter().map(|l| l.to_string()));
        out.push(render_block(block, ctx, resolve));
        next = block.lines.end;
    }
    out.extend(lines[next..].iter().map(|l| l.to_string()));
    out.join("\n")
}

fn render_block(
    block: &FencedBlock,
    ctx: &BlockContext<'_>,
    resolve: &mut dyn FnMut(&str) -> String,
) -> String {
    let body = rewrite(&block.inner_lines.join("\n"), ctx, resolve);

    match &block.kind {
        BlockKind::Callout(style) => callout::render(style, &block.attr, &body, ctx.lang, resolve),
        BlockKind::Group { id, kind } => render_group(id, *kind, &body, ctx, resolve),
        BlockKind::Centered => {
            format!("<div align=\"center\">\n\n{}\n\n</div>", body.trim_matches('\n'))
        }
        BlockKind::Generic => body,
    }
}

/// Side-by-side images with one shared caption.
///
/// Table captions precede the images, figure captions follow them.
fn render_group(
    id: &str,
    kind: ElementKind,
    body: &str,
    ctx: &BlockContext<'_>,
    resolve: &mut dyn FnMut(&str) -> String,
) -> String {
    let lines: Vec<String> = body.split('\n').map(str::to_string).collect();
    let images: Vec<(String, String, Option<String>)> = lines
        .iter()
        .filter_map(|line| GROUP_IMAGE.captures(line))
        .map(|caps| {
            let width = caps
                .get(3)
                .and_then(|m| Attr::parse(m.as_str()).get("width").map(str::to_string));
            (caps[1].to_string(), caps[2].to_string(), width)
        })
        .collect();

    let default_width = format!("{}%", 100 / images.len().max(1));
    let mut row = vec!["<div style=\"display: flex; justify-content: center; gap: 1em;\">".to_string()];
    for (alt, src, width) in &images {
        row.push(format!(
            "<img src=\"{}\" alt=\"{}\" style=\"width: {};\">",
            html::escape_attr(src),
            html::escape_attr(alt),
            html::escape_attr(width.as_deref().unwrap_or(&default_width))
        ));
    }
    row.push("</div>".to_string());

    let number = ctx
        .registry
        .number(id)
        .map(str::to_string)
        .unwrap_or_else(|| registry::fallback_number(id));
    let caption_text = group_caption(&lines);
    let label = format!("{} {}", kind.label(ctx.lang), number);
    let caption = if caption_text.is_empty() {
        format!("<p align=\"center\"><strong>{}</strong></p>", label)
    } else {
        format!(
            "<p align=\"center\"><strong>{}:</strong> {}</p>",
            label,
            html::inline(&resolve(&caption_text))
        )
    };

    let mut parts = vec![format!("<a id=\"{}\"></a>", id)];
    match kind {
        ElementKind::Table => {
            parts.push(caption);
            parts.extend(row);
        }
        _ => {
            parts.extend(row);
            parts.push(caption);
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Definition, Origin};

    fn identity(text: &str) -> String {
        text.to_string()
    }

    fn lines(text: &str) -> Vec<&str> {
        text.split('\n').collect()
    }

    #[test]
    fn test_scan_simple_block() {
        let text = "before\n::: {.callout-tip}\nbody\n:::\nafter";
        let blocks = scan_blocks(&lines(text));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].fence_length, 3);
        assert_eq!(blocks[0].attributes, "{.callout-tip}");
        assert_eq!(blocks[0].inner_lines, vec!["body"]);
        assert_eq!(blocks[0].lines, 1..4);
        assert!(matches!(blocks[0].kind, BlockKind::Callout(_)));
    }

    #[test]
    fn test_nested_fences_kept_verbatim() {
        let text = "::::: {.callout-note}\n::: {.inner}\nx\n:::\n:::: more\ny\n::::\n:::::";
        let blocks = scan_blocks(&lines(text));
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].inner_lines,
            vec!["::: {.inner}", "x", ":::", ":::: more", "y", "::::"]
        );
    }

    #[test]
    fn test_same_length_nesting() {
        let text = "::: {.a}\n::: {.b}\nx\n:::\n:::\n";
        let blocks = scan_blocks(&lines(text));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines, 0..5);
    }

    #[test]
    fn test_short_close_does_not_close_long_fence() {
        let text = ":::: {.a}\n:::\nstill inside\n::::";
        let blocks = scan_blocks(&lines(text));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].inner_lines, vec![":::", "still inside"]);
    }

    #[test]
    fn test_unclosed_fence_is_text() {
        let text = "::: {.callout-tip}\nnever closed";
        assert!(scan_blocks(&lines(text)).is_empty());
        let ctx_registry = ElementRegistry::new();
        let ctx = BlockContext {
            registry: &ctx_registry,
            lang: Language::Portuguese,
        };
        assert_eq!(rewrite(text, &ctx, &mut identity), text);
    }

    #[test]
    fn test_fences_inside_code_ignored() {
        let text = "```\n::: {.callout-tip}\n```\n:::\n";
        assert!(scan_blocks(&lines(text)).is_empty());
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify(&Attr::parse("{.callout-warning}")), BlockKind::Callout(_)));
        assert!(matches!(classify(&Attr::parse("callout-tip")), BlockKind::Callout(_)));
        assert_eq!(
            classify(&Attr::parse("{#fig-1-x layout-ncol=2}")),
            BlockKind::Group {
                id: "fig-1-x".to_string(),
                kind: ElementKind::Figure
            }
        );
        assert_eq!(classify(&Attr::parse("{#fig-1-x}")), BlockKind::Generic);
        assert_eq!(classify(&Attr::parse("{.centered}")), BlockKind::Centered);
        assert_eq!(classify(&Attr::parse("{.column-margin}")), BlockKind::Generic);
        assert_eq!(classify(&Attr::parse("{.callout-custom}")), BlockKind::Generic);
    }

    #[test]
    fn test_generic_strips_fences() {
        let registry = ElementRegistry::new();
        let ctx = BlockContext {
            registry: &registry,
            lang: Language::Portuguese,
        };
        let out = rewrite("a\n::: {.aside}\ninner\n:::\nb", &ctx, &mut identity);
        assert_eq!(out, "a\ninner\nb");
    }

    #[test]
    fn test_centered_wrapper() {
        let registry = ElementRegistry::new();
        let ctx = BlockContext {
            registry: &registry,
            lang: Language::Portuguese,
        };
        let out = rewrite("::: {.centered}\n**x**\n:::", &ctx, &mut identity);
        assert_eq!(out, "<div align=\"center\">\n\n**x**\n\n</div>");
    }

    #[test]
    fn test_deeply_nested_generic_fully_expanded() {
        let registry = ElementRegistry::new();
        let ctx = BlockContext {
            registry: &registry,
            lang: Language::Portuguese,
        };
        let text = ":::::: {.a}\n::::: {.b}\n:::: {.c}\ndeep\n::::\n:::::\n::::::";
        assert_eq!(rewrite(text, &ctx, &mut identity), "deep");
    }

    #[test]
    fn test_group_rendering() {
        let mut registry = ElementRegistry::new();
        registry.assign(Definition {
            id: "fig-1-panel".to_string(),
            kind: ElementKind::Figure,
            caption: "Two panels".to_string(),
            origin: Origin::GroupedBlock,
            content: None,
            unit_index: 0,
        });
        let ctx = BlockContext {
            registry: &registry,
            lang: Language::Portuguese,
        };
        let text = "::: {#fig-1-panel layout-ncol=2}\n![Left](a.png){width=40%}\n![Right](b.png)\n\nTwo *panels*\n:::";
        let out = rewrite(text, &ctx, &mut identity);
        assert!(out.starts_with("<a id=\"fig-1-panel\"></a>\n<div style="));
        assert!(out.contains("<img src=\"a.png\" alt=\"Left\" style=\"width: 40%;\">"));
        assert!(out.contains("<img src=\"b.png\" alt=\"Right\" style=\"width: 50%;\">"));
        assert!(out.ends_with("<p align=\"center\"><strong>Figura 1.1:</strong> Two <em>panels</em></p>"));
        assert!(!out.contains(":::"));
    }

    #[test]
    fn test_table_group_caption_first() {
        let registry = ElementRegistry::new();
        let ctx = BlockContext {
            registry: &registry,
            lang: Language::English,
        };
        let text = "::: {#tbl-2-grid layout-nrow=1}\n![](a.png)\nGrid\n:::";
        let out = rewrite(text, &ctx, &mut identity);
        let caption = out.find("Table 2:").unwrap();
        let image = out.find("<img").unwrap();
        assert!(caption < image);
    }

    #[test]
    fn test_group_caption() {
        let inner: Vec<String> = vec!["![](a.png)", "", "Caption here", "![](b.png)", ""]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(group_caption(&inner), "Caption here");
    }
}
