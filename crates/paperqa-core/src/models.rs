//! Core data models used throughout paperqa.
//!
//! These types are plain records that flow through the ingestion and
//! retrieval pipeline. None of them carry behavior beyond construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::prompt::Persona;

/// One uploaded or fetched PDF file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawDocument {
    pub path: PathBuf,
    /// Display title, derived from the file name unless the catalog
    /// supplied one.
    pub title: String,
}

impl RawDocument {
    /// Create a document whose title is the file name (extension kept).
    pub fn from_path(path: &Path) -> Self {
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path: path.to_path_buf(),
            title,
        }
    }

    pub fn with_title(path: &Path, title: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            title: title.into(),
        }
    }
}

/// Which slot of the ordered extraction chain produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Primary,
    Fallback,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Primary => write!(f, "primary"),
            ExtractionMethod::Fallback => write!(f, "fallback"),
        }
    }
}

/// Output of text extraction for one [`RawDocument`].
///
/// When every strategy fails, `text` is empty, `success` is false and
/// `method` is [`ExtractionMethod::Fallback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    /// Name of the strategy that ran last (e.g. `"lopdf"`).
    pub strategy: String,
    pub success: bool,
}

impl ExtractionResult {
    pub fn failed(strategy: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            method: ExtractionMethod::Fallback,
            strategy: strategy.into(),
            success: false,
        }
    }
}

/// A contiguous titled span of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "section_title")]
    pub title: String,
    pub content: String,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Metadata stored with every [`RetrievableUnit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMetadata {
    /// Title of the section the unit came from.
    pub section: String,
    /// Display title of the owning paper.
    pub source: String,
}

/// An item stored in the vector index; one per qualifying [`Section`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievableUnit {
    pub content: String,
    pub metadata: UnitMetadata,
}

impl RetrievableUnit {
    pub fn new(
        content: impl Into<String>,
        section: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            metadata: UnitMetadata {
                section: section.into(),
                source: source.into(),
            },
        }
    }
}

/// The language model's response to a question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub persona: Persona,
    /// Metadata of the units that were placed in the prompt context.
    pub sources: Vec<UnitMetadata>,
}
