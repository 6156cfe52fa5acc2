/*
 * attr.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Attribute payloads of the form {#id .class key=value}.
 */

//! Attribute payload parsing.
//!
//! Fenced directives, image definitions and table captions all carry a brace
//! payload such as `{#fig-1-overview .column-page width="50%" layout-ncol=2}`.
//! This module splits such a payload into id, classes and key-value pairs.

use hashlink::LinkedHashMap;

/// Parsed `{#id .class key=value}` payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attr {
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: LinkedHashMap<String, String>,
}

impl Attr {
    /// Parse a payload. Surrounding braces are optional.
    ///
    /// A bare word (no `#`, `.` or `=`) is read as a class, so that
    /// `::: callout-tip` and `::: {.callout-tip}` mean the same thing.
    pub fn parse(payload: &str) -> Self {
        let inner = payload.trim();
        let inner = inner.strip_prefix('{').unwrap_or(inner);
        let inner = inner.strip_suffix('}').unwrap_or(inner);

        let mut attr = Attr::default();
        for token in tokenize(inner) {
            if let Some(id) = token.strip_prefix('#') {
                if attr.id.is_none() && !id.is_empty() {
                    attr.id = Some(id.to_string());
                }
            } else if let Some(class) = token.strip_prefix('.') {
                if !class.is_empty() {
                    attr.classes.push(class.to_string());
                }
            } else if let Some((key, value)) = token.split_once('=') {
                let value = unquote(value);
                attr.attributes.insert(key.trim().to_string(), value);
            } else if !token.is_empty() {
                attr.classes.push(token);
            }
        }
        attr
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Whether any `layout`, `layout-ncol`, `layout-nrow`... attribute is set.
    pub fn has_layout(&self) -> bool {
        self.attributes.keys().any(|k| k.starts_with("layout"))
    }
}

/// Split on whitespace, keeping quoted values together.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in s.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                current.push(c);
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Strip one pair of matching surrounding quotes.
pub(crate) fn unquote(value: &str) -> String {
    let value = value.trim();
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let attr = Attr::parse(r#"{#fig-1-panel .wide layout-ncol=2 title="Two words"}"#);
        assert_eq!(attr.id.as_deref(), Some("fig-1-panel"));
        assert_eq!(attr.classes, vec!["wide"]);
        assert_eq!(attr.get("layout-ncol"), Some("2"));
        assert_eq!(attr.get("title"), Some("Two words"));
        assert!(attr.has_layout());
    }

    #[test]
    fn test_bare_word_is_class() {
        let attr = Attr::parse("callout-tip");
        assert!(attr.has_class("callout-tip"));
        assert!(attr.id.is_none());
    }

    #[test]
    fn test_single_quotes_and_no_layout() {
        let attr = Attr::parse("{width='50%'}");
        assert_eq!(attr.get("width"), Some("50%"));
        assert!(!attr.has_layout());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(" \"Mapa de calor\" "), "Mapa de calor");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("\"unbalanced'"), "\"unbalanced'");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(Attr::parse("{}"), Attr::default());
        assert_eq!(Attr::parse(""), Attr::default());
    }
}
