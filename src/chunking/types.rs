use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementCategory {
    Title,
    ListItem,
    Table,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedElement {
    pub text: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_category")]
    pub category: ElementCategory,
}

impl ParsedElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_number: None,
            category: ElementCategory::Other,
        }
    }

    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn with_category(mut self, category: ElementCategory) -> Self {
        self.category = category;
        self
    }
}

// Parsers emit `"category": null` as often as they omit the key.
fn deserialize_category<'de, D>(deserializer: D) -> Result<ElementCategory, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<ElementCategory>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    #[default]
    Generic,
    Email,
    WordProcessor,
}

impl DocKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase()
            .as_str()
        {
            "eml" | "msg" => Self::Email,
            "docx" | "doc" | "odt" | "rtf" => Self::WordProcessor,
            _ => Self::Generic,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|value| value.to_str())
            .map(Self::from_extension)
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Email => "email",
            Self::WordProcessor => "word_processor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Heading,
    Clause,
    ListItem,
    Table,
    Annex,
    Text,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::Clause => "clause",
            Self::ListItem => "list_item",
            Self::Table => "table",
            Self::Annex => "annex",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    pub text: String,
    pub kind: RecordKind,
    pub heading: Option<String>,
    pub section: Option<String>,
    pub clause: Option<String>,
    pub page: u32,
    pub context: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub section: Option<String>,
    pub clause: Option<String>,
    pub page: u32,
    pub context: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_text: String,
    pub heading: Option<String>,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub(super) fn from_record(chunk_text: String, record: &AnnotatedRecord) -> Self {
        Self {
            chunk_text,
            heading: record.heading.clone(),
            metadata: ChunkMetadata {
                section: record.section.clone(),
                clause: record.clause.clone(),
                page: record.page,
                context: record.context.clone(),
                references: Vec::new(),
            },
        }
    }
}

/// Whitespace-delimited word count. This approximates model tokens and is
/// only used for windowing decisions.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
