/*
 * html.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Translation of a markdown subset to HTML for wrapped content.
 */

//! Markdown subset to HTML.
//!
//! Notebook viewers stop interpreting markdown inside an HTML block, so
//! content placed inside a callout `<div>` is translated here. Only the
//! subset that appears in annotated course material is supported:
//!
//! - blocks: paragraphs, ATX headings, bullet and ordered lists, block
//!   quotes, pipe tables, fenced code, `$$` display math, raw HTML
//! - inlines: strong, emphasis, code spans, links, images
//!
//! Display and inline math are passed through untouched. `@` inside code is
//! written as `&#64;` so a later citation pass leaves it alone.
//!
//! The output never contains blank lines, which would end the enclosing
//! HTML block in a markdown viewer.

use std::sync::LazyLock;

use regex::Regex;

use crate::mask::{closes_code_fence, code_fence};

const OPEN: char = '\u{E002}';
const CLOSE: char = '\u{E003}';

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})\s+(.*?)\s*#*\s*$").expect("Invalid regex pattern for headings")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*+]\s+(.*)$").expect("Invalid regex pattern for bullet items")
});

static ORDERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+[.)]\s+(.*)$").expect("Invalid regex pattern for ordered items")
});

static TABLE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?\s*$")
        .expect("Invalid regex pattern for table separators")
});

static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#)
        .expect("Invalid regex pattern for inline images")
});

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]]+)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#)
        .expect("Invalid regex pattern for inline links")
});

static STRONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*([^*]+)\*\*|__([^_]+)__").expect("Invalid regex pattern for strong text")
});

static EMPHASIS_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*([^*\s](?:[^*]*[^*\s])?)\*").expect("Invalid regex pattern for emphasis")
});

/// `_em_` only at word boundaries so `snake_case_names` survive.
static EMPHASIS_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w])_([^_\s](?:[^_]*[^_\s])?)_([^\w]|$)")
        .expect("Invalid regex pattern for underscore emphasis")
});

static INLINE_MATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$[^$\n]+\$").expect("Invalid regex pattern for inline math")
});

static PROTECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E002}(\\d+)\u{E003}").expect("Invalid regex pattern for protected inlines")
});

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?[A-Za-z][^>]*>").expect("Invalid regex pattern for html tags")
});

/// Escape text for use inside an attribute value.
pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Escape `&`, `<` and `>`.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape code so it is inert to every later pass.
fn escape_code(code: &str) -> String {
    escape_text(code).replace('@', "&#64;")
}

/// Translate block-level markdown into HTML.
pub fn blocks(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            i += 1;
        } else if let Some(fence) = code_fence(line) {
            let end = (i + 1..lines.len())
                .find(|&j| closes_code_fence(lines[j], fence))
                .unwrap_or(lines.len());
            let code = lines[i + 1..end].join("\n");
            out.push(format!("<pre><code>{}</code></pre>", escape_code(&code)));
            i = end + 1;
        } else if trimmed.starts_with("$$") {
            let single = trimmed.len() > 2 && trimmed[2..].contains("$$");
            let end = if single {
                i
            } else {
                (i + 1..lines.len())
                    .find(|&j| lines[j].contains("$$"))
                    .unwrap_or(lines.len() - 1)
            };
            out.extend(lines[i..=end].iter().map(|l| l.to_string()));
            i = end + 1;
        } else if trimmed.starts_with('<') {
            while i < lines.len() && !lines[i].trim().is_empty() {
                out.push(lines[i].to_string());
                i += 1;
            }
        } else if let Some(caps) = HEADING.captures(line) {
            let level = caps[1].len();
            out.push(format!("<h{0}>{1}</h{0}>", level, inline(&caps[2])));
            i += 1;
        } else if trimmed.starts_with('|')
            && lines.get(i + 1).is_some_and(|l| TABLE_SEPARATOR.is_match(l))
        {
            let start = i;
            i += 2;
            while i < lines.len() && lines[i].trim_start().starts_with('|') {
                i += 1;
            }
            out.push(table(lines[start], &lines[start + 2..i]));
        } else if trimmed.starts_with('>') {
            let mut quoted = Vec::new();
            while i < lines.len() && lines[i].trim_start().starts_with('>') {
                let stripped = &lines[i].trim_start()[1..];
                quoted.push(stripped.strip_prefix(' ').unwrap_or(stripped).to_string());
                i += 1;
            }
            out.push(format!("<blockquote>\n{}\n</blockquote>", blocks(&quoted.join("\n"))));
        } else if BULLET.is_match(line) || ORDERED.is_match(line) {
            let (tag, pattern) = if BULLET.is_match(line) {
                ("ul", &*BULLET)
            } else {
                ("ol", &*ORDERED)
            };
            let mut items: Vec<String> = Vec::new();
            while i < lines.len() && !lines[i].trim().is_empty() {
                match pattern.captures(lines[i]) {
                    Some(caps) => items.push(caps[1].to_string()),
                    None => match items.last_mut() {
                        // Lazy continuation of the previous item.
                        Some(last) => {
                            last.push(' ');
                            last.push_str(lines[i].trim());
                        }
                        None => break,
                    },
                }
                i += 1;
            }
            let mut list = vec![format!("<{}>", tag)];
            list.extend(items.iter().map(|item| format!("<li>{}</li>", inline(item))));
            list.push(format!("</{}>", tag));
            out.push(list.join("\n"));
        } else {
            let mut paragraph = Vec::new();
            while i < lines.len() && !starts_block(lines[i]) {
                paragraph.push(lines[i].trim());
                i += 1;
            }
            out.push(format!("<p>{}</p>", inline(&paragraph.join(" "))));
        }
    }

    out.join("\n")
}

/// Whether `line` ends a running paragraph.
fn starts_block(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with("$$")
        || trimmed.starts_with('<')
        || trimmed.starts_with('>')
        || HEADING.is_match(line)
        || BULLET.is_match(line)
        || code_fence(line).is_some()
}

fn table(header: &str, rows: &[&str]) -> String {
    let mut out = vec!["<table>".to_string(), "<thead>".to_string()];
    out.push(table_row(header, "th"));
    out.push("</thead>".to_string());
    if !rows.is_empty() {
        out.push("<tbody>".to_string());
        out.extend(rows.iter().map(|row| table_row(row, "td")));
        out.push("</tbody>".to_string());
    }
    out.push("</table>".to_string());
    out.join("\n")
}

fn table_row(row: &str, tag: &str) -> String {
    let row = row.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = row.strip_suffix('|').unwrap_or(row);
    let cells: String = row
        .split('|')
        .map(|cell| format!("<{0}>{1}</{0}>", tag, inline(cell.trim())))
        .collect();
    format!("<tr>{}</tr>", cells)
}

/// Translate inline markdown into HTML.
///
/// Raw HTML tags, math and code spans are protected before any other
/// conversion runs.
pub fn inline(text: &str) -> String {
    let mut protected: Vec<String> = Vec::new();
    let text = protect_code_spans(text, &mut protected);
    let text = protect(&INLINE_MATH, &text, &mut protected, |m| m.to_string());
    let text = protect(&HTML_TAG, &text, &mut protected, |m| m.to_string());

    let text = protect_captures(&IMAGE, &text, &mut protected, |caps| {
        format!(
            "<img src=\"{}\" alt=\"{}\">",
            escape_attr(&caps[2]),
            escape_attr(&caps[1])
        )
    });
    let text = LINK.replace_all(&text, |caps: &regex::Captures| {
        format!("<a href=\"{}\">{}</a>", escape_attr(&caps[2]), &caps[1])
    });
    let text = STRONG.replace_all(&text, |caps: &regex::Captures| {
        let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        format!("<strong>{}</strong>", inner)
    });
    let text = EMPHASIS_STAR.replace_all(&text, "<em>$1</em>");
    let text = EMPHASIS_UNDERSCORE.replace_all(&text, "${1}<em>${2}</em>${3}");

    unprotect(&text, &protected)
}

fn stash(protected: &mut Vec<String>, html: String) -> String {
    protected.push(html);
    format!("{}{}{}", OPEN, protected.len() - 1, CLOSE)
}

fn protect(
    pattern: &Regex,
    text: &str,
    protected: &mut Vec<String>,
    render: impl Fn(&str) -> String,
) -> String {
    pattern
        .replace_all(text, |caps: &regex::Captures| stash(protected, render(&caps[0])))
        .into_owned()
}

fn protect_captures(
    pattern: &Regex,
    text: &str,
    protected: &mut Vec<String>,
    render: impl Fn(&regex::Captures) -> String,
) -> String {
    pattern
        .replace_all(text, |caps: &regex::Captures| stash(protected, render(caps)))
        .into_owned()
}

fn protect_code_spans(text: &str, protected: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('`') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let run = after.chars().take_while(|c| *c == '`').count();
        let fence = &after[..run];
        match after[run..].find(fence) {
            Some(end) => {
                let code = after[run..run + end].trim();
                out.push_str(&stash(protected, format!("<code>{}</code>", escape_code(code))));
                rest = &after[run + end + run..];
            }
            None => {
                out.push_str(fence);
                rest = &after[run..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn unprotect(text: &str, protected: &[String]) -> String {
    if protected.is_empty() {
        return text.to_string();
    }
    // Stashed fragments never contain placeholders themselves.
    PROTECTED
        .replace_all(text, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| protected.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_markup() {
        assert_eq!(
            inline("**bold** and *em* and _also_ and `code`"),
            "<strong>bold</strong> and <em>em</em> and <em>also</em> and <code>code</code>"
        );
    }

    #[test]
    fn test_inline_links_and_images() {
        assert_eq!(
            inline("[Figura 1.1](#fig-1-a) ![alt](img/a.png)"),
            "<a href=\"#fig-1-a\">Figura 1.1</a> <img src=\"img/a.png\" alt=\"alt\">"
        );
    }

    #[test]
    fn test_snake_case_untouched() {
        assert_eq!(inline("call my_long_name now"), "call my_long_name now");
    }

    #[test]
    fn test_math_is_protected() {
        assert_eq!(inline("$a*b*c$ and *x*"), "$a*b*c$ and <em>x</em>");
    }

    #[test]
    fn test_code_at_is_escaped() {
        assert_eq!(inline("`@property`"), "<code>&#64;property</code>");
    }

    #[test]
    fn test_raw_html_passthrough() {
        assert_eq!(
            inline("<span class=\"my_class\">*x*</span>"),
            "<span class=\"my_class\"><em>x</em></span>"
        );
    }

    #[test]
    fn test_blocks() {
        let md = "## Title\n\nFirst line\nsecond line.\n\n- one\n- *two*\n\n1. a\n2. b";
        assert_eq!(
            blocks(md),
            "<h2>Title</h2>\n<p>First line second line.</p>\n<ul>\n<li>one</li>\n<li><em>two</em></li>\n</ul>\n<ol>\n<li>a</li>\n<li>b</li>\n</ol>"
        );
    }

    #[test]
    fn test_blocks_table() {
        let md = "| a | b |\n|---|:-:|\n| 1 | **2** |";
        assert_eq!(
            blocks(md),
            "<table>\n<thead>\n<tr><th>a</th><th>b</th></tr>\n</thead>\n<tbody>\n<tr><td>1</td><td><strong>2</strong></td></tr>\n</tbody>\n</table>"
        );
    }

    #[test]
    fn test_blocks_code_and_math() {
        let md = "```python\n@decorator\nx = a < b\n```\n\n$$\nx^2\n$$";
        assert_eq!(
            blocks(md),
            "<pre><code>&#64;decorator\nx = a &lt; b</code></pre>\n$$\nx^2\n$$"
        );
    }

    #[test]
    fn test_blocks_raw_html_and_quote() {
        let md = "<div class=\"x\">\n<p>kept</p>\n</div>\n\n> quoted *text*";
        assert_eq!(
            blocks(md),
            "<div class=\"x\">\n<p>kept</p>\n</div>\n<blockquote>\n<p>quoted <em>text</em></p>\n</blockquote>"
        );
    }

    #[test]
    fn test_no_blank_lines_in_output() {
        let md = "a\n\n\n\nb\n\n## c\n\n- d";
        assert!(!blocks(md).contains("\n\n"));
    }
}
