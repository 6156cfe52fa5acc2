/*
 * notebook.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Jupyter notebook container I/O.
 */

//! Notebook reading and writing.
//!
//! Only the parts the resolver needs are typed: the cell kind and its
//! source. Everything else (outputs, execution counts, cell ids, notebook
//! metadata, nbformat version) is kept as raw JSON and written back
//! unchanged.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{AnnotateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Markdown,
    Code,
    Raw,
}

/// One notebook cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(rename = "cell_type")]
    pub kind: CellKind,
    /// Cell text. Read from a string or a list of lines, written as lines.
    #[serde(deserialize_with = "source_text", serialize_with = "source_lines")]
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Source {
    Text(String),
    Lines(Vec<String>),
}

fn source_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Source::deserialize(deserializer)? {
        Source::Text(text) => text,
        Source::Lines(lines) => lines.concat(),
    })
}

fn source_lines<S: Serializer>(source: &str, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    lines.serialize(serializer)
}

impl Cell {
    pub fn markdown(source: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("metadata".to_string(), Value::Object(Map::new()));
        Self {
            kind: CellKind::Markdown,
            source: source.into(),
            extra,
        }
    }

    pub fn code(source: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("execution_count".to_string(), Value::Null);
        extra.insert("metadata".to_string(), Value::Object(Map::new()));
        extra.insert("outputs".to_string(), Value::Array(Vec::new()));
        Self {
            kind: CellKind::Code,
            source: source.into(),
            extra,
        }
    }

    /// The cell's `metadata` object, if present.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.extra.get("metadata").and_then(Value::as_object)
    }

    /// Set `metadata.<key>`, creating the metadata object when missing.
    pub fn set_metadata(&mut self, key: &str, value: Value) {
        let metadata = self
            .extra
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Map::new());
        }
        if let Value::Object(map) = metadata {
            map.insert(key.to_string(), value);
        }
    }

    /// The cell `id` (nbformat 4.5 and later).
    pub fn id(&self) -> Option<&str> {
        self.extra.get("id").and_then(Value::as_str)
    }
}

/// A notebook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notebook {
    pub fn new(cells: Vec<Cell>) -> Self {
        let mut extra = Map::new();
        extra.insert("nbformat".to_string(), Value::from(4));
        extra.insert("nbformat_minor".to_string(), Value::from(5));
        Self {
            cells,
            metadata: Value::Object(Map::new()),
            extra,
        }
    }

    /// Parse notebook JSON.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.get("cells").is_some_and(Value::is_array) {
            return Err(AnnotateError::InvalidNotebook(
                "missing `cells` array".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AnnotateError::read(path, e))?;
        Self::parse(&text)
    }

    /// Serialize with one-space indentation, as Jupyter writes notebooks.
    pub fn to_json(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        let mut text = String::from_utf8(buffer)
            .map_err(|e| AnnotateError::InvalidNotebook(e.to_string()))?;
        text.push('\n');
        Ok(text)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Whether cells carry `id` fields, which generated cells must then have.
    pub fn uses_cell_ids(&self) -> bool {
        self.cells.iter().any(|cell| cell.id().is_some())
    }
}
