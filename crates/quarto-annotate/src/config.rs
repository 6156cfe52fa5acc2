/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Layered configuration for annotation resolution.
 */

//! Configuration for annotation resolution.
//!
//! Options come from up to three layers, lowest precedence first:
//!
//! 1. `_annotate.yml` next to the document
//! 2. the `annotate` key of the notebook metadata
//! 3. command-line flags
//!
//! Each layer is a [`ConfigLayer`] where every field is optional. Layers are
//! combined with [`ConfigLayer::merge`] and finally turned into a concrete
//! [`AnnotateConfig`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AnnotateError, Result};

/// Name of the project-level configuration file.
pub const PROJECT_CONFIG_FILE: &str = "_annotate.yml";

/// Notebook metadata key holding document-level options.
pub const METADATA_KEY: &str = "annotate";

/// Language used for generated words (labels, conjunctions, titles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// Brazilian Portuguese (default)
    #[default]
    Portuguese,
    English,
}

impl Language {
    /// Parse from string value. Unknown values fall back to the default.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" | "english" => Self::English,
            _ => Self::Portuguese,
        }
    }

    /// Convert to string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portuguese => "pt",
            Self::English => "en",
        }
    }

    pub fn figure_label(&self) -> &'static str {
        match self {
            Self::Portuguese => "Figura",
            Self::English => "Figure",
        }
    }

    pub fn table_label(&self) -> &'static str {
        match self {
            Self::Portuguese => "Tabela",
            Self::English => "Table",
        }
    }

    pub fn equation_label(&self) -> &'static str {
        match self {
            Self::Portuguese => "Equação",
            Self::English => "Equation",
        }
    }

    /// Conjunction placed between two author surnames in narrative citations.
    pub fn conjunction(&self) -> &'static str {
        match self {
            Self::Portuguese => "e",
            Self::English => "and",
        }
    }

    /// Marker used when an entry has no year.
    pub fn undated(&self) -> &'static str {
        match self {
            Self::Portuguese => "s.d.",
            Self::English => "n.d.",
        }
    }

    pub fn references_title(&self) -> &'static str {
        match self {
            Self::Portuguese => "Referências",
            Self::English => "References",
        }
    }
}

/// One configuration layer. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConfigLayer {
    pub lang: Option<String>,
    pub bibliography: Option<PathBuf>,
    pub nocite: Option<Vec<String>>,
    pub suppress_bibliography: Option<bool>,
    pub references_title: Option<String>,
    pub strip_directives: Option<bool>,
    pub clean: Option<bool>,
}

impl ConfigLayer {
    /// Read a YAML layer from disk.
    ///
    /// A relative `bibliography` path is rebased onto the directory holding
    /// the configuration file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AnnotateError::read(path, e))?;
        let layer = Self::from_yaml_str(&text).map_err(|message| AnnotateError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(layer.rebased(path.parent().unwrap_or(Path::new("."))))
    }

    /// Parse a YAML layer. An empty document yields an empty layer.
    pub fn from_yaml_str(text: &str) -> std::result::Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    /// Extract the layer stored under [`METADATA_KEY`] in notebook metadata.
    ///
    /// Missing or malformed metadata yields an empty layer; a malformed value
    /// is logged rather than failing the document.
    pub fn from_metadata(metadata: &serde_json::Value) -> Self {
        let Some(value) = metadata.get(METADATA_KEY) else {
            return Self::default();
        };
        match serde_json::from_value(value.clone()) {
            Ok(layer) => layer,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed `{}` notebook metadata", METADATA_KEY);
                Self::default()
            }
        }
    }

    /// Make a relative bibliography path relative to `base` instead.
    pub fn rebased(mut self, base: &Path) -> Self {
        if let Some(bib) = &self.bibliography {
            if bib.is_relative() {
                self.bibliography = Some(base.join(bib));
            }
        }
        self
    }

    /// Combine two layers; values set in `over` win.
    pub fn merge(self, over: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            lang: over.lang.or(self.lang),
            bibliography: over.bibliography.or(self.bibliography),
            nocite: over.nocite.or(self.nocite),
            suppress_bibliography: over.suppress_bibliography.or(self.suppress_bibliography),
            references_title: over.references_title.or(self.references_title),
            strip_directives: over.strip_directives.or(self.strip_directives),
            clean: over.clean.or(self.clean),
        }
    }

    /// Produce the concrete configuration, filling defaults.
    pub fn resolve(self) -> AnnotateConfig {
        let lang = self
            .lang
            .as_deref()
            .map(Language::from_str)
            .unwrap_or_default();
        AnnotateConfig {
            lang,
            bibliography: self.bibliography,
            nocite: self.nocite.unwrap_or_default(),
            suppress_bibliography: self.suppress_bibliography.unwrap_or(false),
            references_title: self
                .references_title
                .unwrap_or_else(|| lang.references_title().to_string()),
            strip_directives: self.strip_directives.unwrap_or(true),
            clean: self.clean.unwrap_or(true),
        }
    }
}

/// Resolved configuration used by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateConfig {
    pub lang: Language,
    /// Bibliography file in the brace-record format.
    pub bibliography: Option<PathBuf>,
    /// Keys listed in the reference list even when never cited.
    pub nocite: Vec<String>,
    /// Skip generating the reference list entirely.
    pub suppress_bibliography: bool,
    /// Heading of the generated reference list.
    pub references_title: String,
    /// Remove `#| label:` and `#| *-cap:` lines from code cells.
    pub strip_directives: bool,
    /// Prepare the notebook for distribution (see [`crate::pipeline::clean`]).
    pub clean: bool,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        ConfigLayer::default().resolve()
    }
}
