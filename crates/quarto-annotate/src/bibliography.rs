/*
 * bibliography.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Bibliography store for brace-delimited (BibTeX-style) records.
 */

//! Bibliography store.
//!
//! Parses records of the form
//!
//! ```text
//! @book{tan2009,
//!   author = {Tan, M. and Steinbach, M. and Kumar, V.},
//!   title  = {Introduction to {Data} Mining},
//!   year   = 2009,
//! }
//! ```
//!
//! into a flat `key -> fields` mapping. Parsing is best effort: records that
//! cannot be delimited or that carry no key are skipped. The store is pure
//! data and is never mutated after construction.

use std::path::Path;
use std::sync::LazyLock;

use hashlink::LinkedHashMap;
use regex::Regex;

use crate::error::{AnnotateError, Result};

/// `name = {value}`, `name = "value"` or `name = 2009`.
///
/// Braced values may nest two levels deep.
static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)([A-Za-z][\w-]*)\s*=\s*(?:\{((?:[^{}]|\{(?:[^{}]|\{[^{}]*\})*\})*)\}|"((?:[^"\\]|\\.)*)"|(\w+))"#,
    )
    .expect("Invalid regex pattern for bibliography fields")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex pattern for whitespace"));

/// Record types that never describe a citable work.
const SKIPPED_RECORD_TYPES: &[&str] = &["comment", "string", "preamble"];

/// A single bibliography record.
#[derive(Debug, Clone, PartialEq)]
pub struct BibEntry {
    pub key: String,
    /// Record type, lowercased (`book`, `article`, ...).
    pub entry_type: String,
    /// Field values keyed by lowercased field name, in source order.
    pub fields: LinkedHashMap<String, String>,
}

impl BibEntry {
    /// Look up a field, treating empty values as absent.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// Mapping from citation key to bibliography entry.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: LinkedHashMap<String, BibEntry>,
}

impl Bibliography {
    /// An empty bibliography; every citation resolves to a placeholder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a bibliography file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AnnotateError::read(path, e))?;
        let bibliography = Self::parse(&text);
        tracing::debug!(
            path = %path.display(),
            entries = bibliography.len(),
            "Loaded bibliography"
        );
        Ok(bibliography)
    }

    /// Parse bibliography text. Malformed records are skipped.
    pub fn parse(text: &str) -> Self {
        let mut entries = LinkedHashMap::new();

        for (entry_type, body) in RecordScanner::new(text) {
            if SKIPPED_RECORD_TYPES.contains(&entry_type.as_str()) {
                continue;
            }
            let Some((key, rest)) = body.split_once(',') else {
                tracing::debug!(record = %entry_type, "Skipping bibliography record without fields");
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                tracing::debug!(record = %entry_type, "Skipping bibliography record without a key");
                continue;
            }
            if entries.contains_key(key) {
                tracing::warn!(key, "Duplicate bibliography key; keeping the first entry");
                continue;
            }
            let entry = BibEntry {
                key: key.to_string(),
                entry_type,
                fields: parse_fields(rest),
            };
            entries.insert(key.to_string(), entry);
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in source order.
    pub fn entries(&self) -> impl Iterator<Item = &BibEntry> {
        self.entries.values()
    }
}

fn parse_fields(body: &str) -> LinkedHashMap<String, String> {
    let mut fields = LinkedHashMap::new();
    for caps in FIELD_PATTERN.captures_iter(body) {
        let name = caps[1].to_lowercase();
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or("");
        let value = WHITESPACE.replace_all(raw.trim(), " ").into_owned();
        if !fields.contains_key(&name) {
            fields.insert(name, value);
        }
    }
    fields
}

/// Iterates over `(record_type, body)` pairs of `@type{...}` records.
///
/// Record bodies are delimited by counting braces, so arbitrarily nested
/// values do not end a record early. A record whose braces never balance
/// is skipped up to the next line starting with `@`.
struct RecordScanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> RecordScanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl Iterator for RecordScanner<'_> {
    type Item = (String, String);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let at = self.text[self.pos..].find('@')? + self.pos;
            let after_at = &self.text[at + 1..];
            let type_len = after_at
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(after_at.len());
            let entry_type = &after_at[..type_len];
            let rest = after_at[type_len..].trim_start();
            let open_offset = self.text.len() - rest.len();

            if entry_type.is_empty() || !rest.starts_with(['{', '(']) {
                self.pos = at + 1;
                continue;
            }

            let (open, close) = if rest.starts_with('{') {
                ('{', '}')
            } else {
                ('(', ')')
            };
            let mut depth = 0usize;
            let mut end = None;
            for (i, c) in rest.char_indices() {
                if c == open || (open == '(' && c == '{') {
                    depth += 1;
                } else if c == close || (open == '(' && c == '}') {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
            }

            let Some(end) = end else {
                tracing::debug!(record = %entry_type, "Unbalanced braces in bibliography record");
                self.pos = next_record_line(self.text, at + 1)?;
                continue;
            };

            self.pos = open_offset + end + 1;
            let body = rest[1..end].to_string();
            return Some((entry_type.to_lowercase(), body));
        }
    }
}

/// Offset of the first line after `from` that starts with `@`.
fn next_record_line(text: &str, from: usize) -> Option<usize> {
    text[from..]
        .match_indices('\n')
        .map(|(i, _)| from + i + 1)
        .find(|&start| text[start..].trim_start_matches([' ', '\t']).starts_with('@'))
}
