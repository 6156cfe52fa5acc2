/*
 * mask.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Protection of code regions from dialect rewriting.
 */

//! Code masking.
//!
//! `@decorator` inside an inline code span or a fenced code block is code,
//! not a citation. Before any rewrite stage runs, code regions are replaced
//! by opaque placeholders built from private-use code points; after the last
//! stage they are restored verbatim.
//!
//! Fenced code blocks are replaced by a placeholder occupying a single line,
//! so line-oriented detectors still see block boundaries.

use std::sync::LazyLock;

use regex::Regex;

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}(\\d+)\u{E001}").expect("Invalid regex pattern for code placeholder")
});

/// Text with code regions swapped out for placeholders.
#[derive(Debug, Clone)]
pub struct MaskedText {
    text: String,
    segments: Vec<String>,
}

impl MaskedText {
    /// Mask fenced code blocks and inline code spans in `text`.
    pub fn new(text: &str) -> Self {
        let mut segments = Vec::new();
        let without_blocks = mask_fenced_blocks(text, &mut segments);
        let text = mask_code_spans(&without_blocks, &mut segments);
        Self { text, segments }
    }

    /// The masked text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Put the original code regions back into (a rewritten version of) the
    /// masked text.
    pub fn restore(&self, rewritten: &str) -> String {
        if self.segments.is_empty() {
            return rewritten.to_string();
        }
        PLACEHOLDER
            .replace_all(rewritten, |caps: &regex::Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.segments.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn placeholder(segments: &mut Vec<String>, code: String) -> String {
    segments.push(code);
    format!("{}{}{}", OPEN, segments.len() - 1, CLOSE)
}

/// Opening fence of a fenced code block: up to three spaces, then three or
/// more backticks or tildes. Returns the fence character and run length.
pub(crate) fn code_fence(line: &str) -> Option<(char, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let fence_char = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = rest.chars().take_while(|c| *c == fence_char).count();
    (run >= 3).then_some((fence_char, run))
}

/// Whether `line` closes a code block opened with `fence`.
pub(crate) fn closes_code_fence(line: &str, fence: (char, usize)) -> bool {
    match code_fence(line) {
        Some((c, run)) => {
            c == fence.0 && run >= fence.1 && line.trim().chars().all(|ch| ch == fence.0)
        }
        None => false,
    }
}

fn mask_fenced_blocks(text: &str, segments: &mut Vec<String>) -> String {
    let mut out: Vec<String> = Vec::new();
    let lines: Vec<&str> = text.split('\n').collect();
    let mut i = 0;

    while i < lines.len() {
        let Some(fence) = code_fence(lines[i]) else {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        };
        let close = (i + 1..lines.len()).find(|&j| closes_code_fence(lines[j], fence));
        // An unclosed fence runs to the end of the text.
        let end = close.unwrap_or(lines.len() - 1);
        let block = lines[i..=end].join("\n");
        out.push(placeholder(segments, block));
        i = end + 1;
    }

    out.join("\n")
}

fn mask_code_spans(text: &str, segments: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('`') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let run = after.chars().take_while(|c| *c == '`').count();
        let body = &after[run..];

        match find_closing_run(body, run) {
            Some(end) => {
                let span_len = run + end + run;
                out.push_str(&placeholder(segments, after[..span_len].to_string()));
                rest = &after[span_len..];
            }
            None => {
                out.push_str(&after[..run]);
                rest = &after[run..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Byte offset in `body` of a backtick run of exactly `run` characters.
fn find_closing_run(body: &str, run: usize) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let len = bytes[i..].iter().take_while(|b| **b == b'`').count();
            if len == run {
                return Some(i);
            }
            i += len;
        } else {
            i += 1;
        }
    }
    None
}
