/*
 * citation.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Author-date citation formatting.
 */

//! Citation formatting.
//!
//! Renders bibliography entries in a fixed author-date style:
//!
//! | authors | narrative              | parenthetical              |
//! |---------|------------------------|----------------------------|
//! | 0       | `(2009)`               | `(2009)`                   |
//! | 1       | `Tan (2009)`           | `(TAN, 2009)`              |
//! | 2       | `Han e Kamber (2008)`  | `(HAN; KAMBER, 2008)`      |
//! | 3+      | `Tan et al. (2009)`    | `(TAN et al., 2009)`       |
//!
//! Unknown keys never fail: they render as `?key` so the document can still
//! be produced with a broken bibliography.

use std::sync::LazyLock;

use regex::Regex;

use crate::bibliography::{BibEntry, Bibliography};
use crate::config::Language;

static AUTHOR_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+and\s+").expect("Invalid regex pattern for author separator")
});

static DATE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("Invalid regex pattern for date year"));

/// One author name split into surname and given names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub surname: String,
    pub given: Option<String>,
}

/// Parsed author list of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorList {
    pub authors: Vec<Author>,
    /// The field ended with `and others`.
    pub truncated: bool,
}

impl AuthorList {
    /// Split an `author` field on the `and` conjunction.
    ///
    /// `Surname, Given` uses the text before the comma as surname; otherwise
    /// the last whitespace-separated word is the surname.
    pub fn parse(field: &str) -> Self {
        let mut list = AuthorList::default();
        for token in AUTHOR_SEPARATOR.split(field) {
            let token = strip_braces(token.trim());
            if token.is_empty() {
                continue;
            }
            if token.eq_ignore_ascii_case("others") {
                list.truncated = true;
                continue;
            }
            let author = match token.split_once(',') {
                Some((surname, given)) => Author {
                    surname: surname.trim().to_string(),
                    given: Some(given.trim().to_string()).filter(|g| !g.is_empty()),
                },
                None => {
                    let mut words: Vec<&str> = token.split_whitespace().collect();
                    let surname = words.pop().unwrap_or_default().to_string();
                    let given = words.join(" ");
                    Author {
                        surname,
                        given: Some(given).filter(|g| !g.is_empty()),
                    }
                }
            };
            list.authors.push(author);
        }
        list
    }

    fn uses_et_al(&self) -> bool {
        self.authors.len() >= 3 || (self.truncated && !self.authors.is_empty())
    }
}

/// A citation item inside a bracketed citation group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiteItem {
    pub key: String,
    /// Locator such as `p. 42`, rendered after the year.
    pub locator: Option<String>,
    /// `-@key`: render the year only.
    pub suppress_author: bool,
}

impl CiteItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            locator: None,
            suppress_author: false,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn suppressing_author(mut self) -> Self {
        self.suppress_author = true;
        self
    }
}

/// Formats citations and reference-list entries against a bibliography.
pub struct CitationFormatter<'a> {
    bibliography: &'a Bibliography,
    lang: Language,
}

impl<'a> CitationFormatter<'a> {
    pub fn new(bibliography: &'a Bibliography, lang: Language) -> Self {
        Self { bibliography, lang }
    }

    /// Narrative form: `Tan (2009)`.
    pub fn narrative(&self, key: &str) -> String {
        let Some(entry) = self.bibliography.get(key) else {
            return placeholder(key);
        };
        let authors = authors_of(entry);
        let year = self.year(entry);
        let surnames: Vec<&str> = authors.authors.iter().map(|a| a.surname.as_str()).collect();
        match surnames.as_slice() {
            [] => format!("({})", year),
            [one] if !authors.uses_et_al() => format!("{} ({})", one, year),
            [first, second] if !authors.uses_et_al() => {
                format!("{} {} {} ({})", first, self.lang.conjunction(), second, year)
            }
            [first, ..] => format!("{} et al. ({})", first, year),
        }
    }

    /// Parenthetical form for a single key: `(TAN, 2009)`.
    pub fn parenthetical(&self, key: &str) -> String {
        self.grouped(&[CiteItem::new(key)])
    }

    /// Grouped parenthetical form: `(HAN; KAMBER, 2008; TAN et al., 2009)`.
    pub fn grouped(&self, items: &[CiteItem]) -> String {
        let parts: Vec<String> = items.iter().map(|item| self.group_part(item)).collect();
        format!("({})", parts.join("; "))
    }

    /// One item of a parenthetical group, without the enclosing parentheses.
    fn group_part(&self, item: &CiteItem) -> String {
        let Some(entry) = self.bibliography.get(&item.key) else {
            return placeholder(&item.key);
        };
        let authors = authors_of(entry);
        let year = self.year(entry);
        let upper: Vec<String> = authors
            .authors
            .iter()
            .map(|a| a.surname.to_uppercase())
            .collect();
        let mut part = if item.suppress_author {
            year
        } else if authors.uses_et_al() {
            format!("{} et al., {}", upper[0], year)
        } else if upper.is_empty() {
            year
        } else {
            format!("{}, {}", upper.join("; "), year)
        };
        if let Some(locator) = &item.locator {
            part.push_str(", ");
            part.push_str(locator);
        }
        part
    }

    /// Full reference-list entry:
    /// `SURNAME, Given. **Title**. City, Publisher, Year.`
    ///
    /// Components whose fields are absent are omitted.
    pub fn reference_entry(&self, entry: &BibEntry) -> String {
        let authors = authors_of(entry);
        let mut names: Vec<String> = authors
            .authors
            .iter()
            .map(|a| match &a.given {
                Some(given) => format!("{}, {}", a.surname.to_uppercase(), given),
                None => a.surname.to_uppercase(),
            })
            .collect();
        if authors.truncated && !names.is_empty() {
            names.push("et al".to_string());
        }

        let title = entry
            .get("title")
            .map(|t| format!("**{}**", strip_braces(t).trim_end_matches('.')));

        let city = entry.get("address").or_else(|| entry.get("location"));
        let publisher = ["publisher", "journal", "booktitle", "school", "institution"]
            .iter()
            .find_map(|field| entry.get(field));
        let year = year_of(entry);
        let imprint: Vec<String> = [city, publisher, year.as_deref()]
            .into_iter()
            .flatten()
            .map(strip_braces)
            .collect();

        let components: Vec<String> = [
            Some(names.join("; ")).filter(|n| !n.is_empty()),
            title,
            Some(imprint.join(", ")).filter(|i| !i.is_empty()),
        ]
        .into_iter()
        .flatten()
        .map(|c| c.trim().trim_end_matches('.').to_string())
        .filter(|c| !c.is_empty())
        .collect();

        if components.is_empty() {
            return format!("{}.", entry.key);
        }
        format!("{}.", components.join(". "))
    }

    /// Ordering key of a reference-list entry: author surnames, then year.
    pub fn sort_key(&self, entry: &BibEntry) -> (String, String) {
        let authors = authors_of(entry)
            .authors
            .iter()
            .map(|a| a.surname.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let authors = if authors.is_empty() {
            entry.get("title").map(strip_braces).unwrap_or_default().to_lowercase()
        } else {
            authors
        };
        (authors, self.year(entry))
    }

    fn year(&self, entry: &BibEntry) -> String {
        year_of(entry).unwrap_or_else(|| self.lang.undated().to_string())
    }
}

fn authors_of(entry: &BibEntry) -> AuthorList {
    entry
        .get("author")
        .or_else(|| entry.get("editor"))
        .map(AuthorList::parse)
        .unwrap_or_default()
}

fn year_of(entry: &BibEntry) -> Option<String> {
    if let Some(year) = entry.get("year") {
        return Some(strip_braces(year));
    }
    entry
        .get("date")
        .and_then(|date| DATE_YEAR.find(date))
        .map(|m| m.as_str().to_string())
}

/// Fallback text for a key missing from the bibliography.
pub fn placeholder(key: &str) -> String {
    format!("?{}", key)
}

/// Remove BibTeX protective braces.
fn strip_braces(s: &str) -> String {
    s.chars().filter(|c| *c != '{' && *c != '}').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bib() -> Bibliography {
        Bibliography::parse(
            r#"
@misc{tan_single, author = {Tan, M.}, year = {2009}}
@book{tan2009,
  author = {Tan, M. and Steinbach, M. and Kumar, V.},
  title = {Introduction to Data Mining},
  publisher = {Pearson},
  address = {Boston},
  year = {2009}
}
@book{han2008,
  author = {Jiawei Han and Micheline Kamber},
  title = {Data Mining},
  publisher = {Morgan Kaufmann},
  year = {2008}
}
@misc{anon, title = {Anonymous Report}}
@misc{dated, author = {{da Silva}, João}, date = {2015-03-01}}
@misc{others, author = {Knuth, Donald and others}, year = {1997}}
"#,
        )
    }

    #[test]
    fn test_author_parsing() {
        let list = AuthorList::parse("Tan, M. and Pang-Ning Tan and {da Silva}, João");
        let surnames: Vec<&str> = list.authors.iter().map(|a| a.surname.as_str()).collect();
        assert_eq!(surnames, vec!["Tan", "Tan", "da Silva"]);
        assert_eq!(list.authors[1].given.as_deref(), Some("Pang-Ning"));
        assert!(!list.truncated);
    }

    #[test]
    fn test_narrative_single_author() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        assert_eq!(fmt.narrative("tan_single"), "Tan (2009)");
    }

    #[test]
    fn test_narrative_two_and_three_authors() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        assert_eq!(fmt.narrative("han2008"), "Han e Kamber (2008)");
        assert_eq!(fmt.narrative("tan2009"), "Tan et al. (2009)");

        let fmt = CitationFormatter::new(&bib, Language::English);
        assert_eq!(fmt.narrative("han2008"), "Han and Kamber (2008)");
    }

    #[test]
    fn test_no_authors_and_undated() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        assert_eq!(fmt.narrative("anon"), "(s.d.)");
        assert_eq!(fmt.parenthetical("anon"), "(s.d.)");

        let fmt = CitationFormatter::new(&bib, Language::English);
        assert_eq!(fmt.narrative("anon"), "(n.d.)");
    }

    #[test]
    fn test_year_from_date_field() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        assert_eq!(fmt.narrative("dated"), "da Silva (2015)");
        assert_eq!(fmt.parenthetical("dated"), "(DA SILVA, 2015)");
    }

    #[test]
    fn test_and_others_uses_et_al() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        assert_eq!(fmt.narrative("others"), "Knuth et al. (1997)");
    }

    #[test]
    fn test_parenthetical() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        assert_eq!(fmt.parenthetical("tan_single"), "(TAN, 2009)");
        assert_eq!(fmt.parenthetical("han2008"), "(HAN; KAMBER, 2008)");
        assert_eq!(fmt.parenthetical("tan2009"), "(TAN et al., 2009)");
    }

    #[test]
    fn test_grouped() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        let items = vec![CiteItem::new("han2008"), CiteItem::new("tan2009")];
        assert_eq!(fmt.grouped(&items), "(HAN; KAMBER, 2008; TAN et al., 2009)");
    }

    #[test]
    fn test_grouped_with_locator_and_unknown() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        let items = vec![
            CiteItem::new("tan_single").with_locator("p. 42"),
            CiteItem::new("ghost2099"),
        ];
        assert_eq!(fmt.grouped(&items), "(TAN, 2009, p. 42; ?ghost2099)");
    }

    #[test]
    fn test_suppress_author() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        let items = vec![CiteItem::new("tan2009").suppressing_author().with_locator("cap. 2")];
        assert_eq!(fmt.grouped(&items), "(2009, cap. 2)");
    }

    #[test]
    fn test_sort_key() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        let mut keys: Vec<&str> = vec!["tan2009", "han2008", "anon", "tan_single"];
        keys.sort_by_key(|k| fmt.sort_key(bib.get(k).unwrap()));
        assert_eq!(keys, vec!["anon", "han2008", "tan_single", "tan2009"]);
    }

    #[test]
    fn test_unknown_key_placeholder() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        assert_eq!(fmt.narrative("ghost2099"), "?ghost2099");
    }

    #[test]
    fn test_reference_entry_full() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        let entry = bib.get("tan2009").unwrap();
        assert_eq!(
            fmt.reference_entry(entry),
            "TAN, M.; STEINBACH, M.; KUMAR, V. **Introduction to Data Mining**. Boston, Pearson, 2009."
        );
    }

    #[test]
    fn test_reference_entry_omits_missing_components() {
        let bib = bib();
        let fmt = CitationFormatter::new(&bib, Language::Portuguese);
        assert_eq!(
            fmt.reference_entry(bib.get("han2008").unwrap()),
            "HAN, Jiawei; KAMBER, Micheline. **Data Mining**. Morgan Kaufmann, 2008."
        );
        assert_eq!(
            fmt.reference_entry(bib.get("anon").unwrap()),
            "**Anonymous Report**."
        );
    }
}
