use anyhow::{Context, Result};
use regex::Regex;

use super::types::{AnnotatedRecord, ElementCategory, ParsedElement, RecordKind};

const MAX_SUBSECTION_TITLE_CHARS: usize = 120;
const MIN_ALL_CAPS_RUN: usize = 10;

/// Running document position carried from one element to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureState {
    pub section: Option<String>,
    pub clause: Option<String>,
    pub heading: Option<String>,
    pub page: u32,
    pub context: Vec<String>,
}

impl Default for StructureState {
    fn default() -> Self {
        Self {
            section: None,
            clause: None,
            heading: None,
            page: 1,
            context: Vec::new(),
        }
    }
}

impl StructureState {
    fn record(&self, text: &str, kind: RecordKind) -> AnnotatedRecord {
        AnnotatedRecord {
            text: text.to_string(),
            kind,
            heading: self.heading.clone(),
            section: self.section.clone(),
            clause: self.clause.clone(),
            page: self.page,
            context: self.context.clone(),
        }
    }

}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementClass {
    Heading,
    Clause { marker: String },
    Body { kind: RecordKind, qualifiers: Vec<String> },
}

#[derive(Debug)]
pub struct StructureDetector {
    keyword_section: Regex,
    numbered_section: Regex,
    numbered_subsection: Regex,
    all_caps_run: Regex,
    clause_marker: Regex,
    qualifier: Regex,
}

impl StructureDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            keyword_section: Regex::new(
                r"^(?i:section|article|chapter|part)\s+(?:\d+[A-Za-z]?|[IVXLC]+)(?:\.\d+)*(?:\s*[:\-\x{2013}]\s*\S.*|\s+[^a-z]+)?$",
            )
            .context("failed to compile keyword section regex")?,
            numbered_section: Regex::new(r"^\d+\.\s*[A-Z][A-Z &/,'()\-]{2,}$")
                .context("failed to compile numbered section regex")?,
            numbered_subsection: Regex::new(r"^(\d+(?:\.\d+)+)\.?\s+(\S.*)$")
                .context("failed to compile numbered subsection regex")?,
            all_caps_run: Regex::new(r"^[A-Z][A-Z\s]*")
                .context("failed to compile all-caps heading regex")?,
            clause_marker: Regex::new(
                r"(?i)^(?:\(?[a-z]\)|\(?[ivx]{1,5}\)|(?:\d{1,3}|[ivx]{1,5})\.(?:\s|$)|code\s*-\s*[a-z0-9]+)",
            )
            .context("failed to compile clause marker regex")?,
            qualifier: Regex::new(
                r"(?i)\b(?:not\s+covered|exclusions?|conditions\s+apply|subject\s+to|except\s+for|unless\s+otherwise\s+stated)\b",
            )
            .context("failed to compile qualifier regex")?,
        })
    }

    pub fn detect(&self, elements: &[ParsedElement]) -> Vec<AnnotatedRecord> {
        let (_, records) = elements.iter().fold(
            (StructureState::default(), Vec::with_capacity(elements.len())),
            |(state, mut records), element| {
                let (state, record) = self.step(state, element);
                records.extend(record);
                (state, records)
            },
        );

        records
    }

    pub fn step(
        &self,
        mut state: StructureState,
        element: &ParsedElement,
    ) -> (StructureState, Option<AnnotatedRecord>) {
        let text = element.text.trim();
        if text.is_empty() {
            return (state, None);
        }

        if let Some(page) = element.page_number {
            state.page = page;
        }

        let record = match self.classify(text, element.category) {
            ElementClass::Heading => {
                state.section = Some(text.to_string());
                state.heading = Some(text.to_string());
                state.context.clear();
                AnnotatedRecord {
                    clause: None,
                    ..state.record(text, RecordKind::Heading)
                }
            }
            ElementClass::Clause { marker } => {
                state.clause = Some(marker);
                state.record(text, RecordKind::Clause)
            }
            ElementClass::Body { kind, qualifiers } => {
                state.context.extend(qualifiers);
                if kind == RecordKind::Annex {
                    if state.section.is_none() {
                        state.section = Some(text.to_string());
                    }
                    if state.heading.is_none() {
                        state.heading = Some(text.to_string());
                    }
                }
                state.record(text, kind)
            }
        };

        (state, Some(record))
    }

    pub fn classify(&self, text: &str, category: ElementCategory) -> ElementClass {
        if self.is_heading(text, category) {
            return ElementClass::Heading;
        }

        if category == ElementCategory::Table {
            return ElementClass::Body {
                kind: RecordKind::Table,
                qualifiers: self.qualifiers(text),
            };
        }

        if let Some(marker) = self.clause_marker(text) {
            return ElementClass::Clause {
                marker: marker.to_string(),
            };
        }

        ElementClass::Body {
            kind: body_kind(text, category),
            qualifiers: self.qualifiers(text),
        }
    }

    pub fn is_heading(&self, text: &str, category: ElementCategory) -> bool {
        match category {
            ElementCategory::Title => return true,
            ElementCategory::ListItem | ElementCategory::Table => return false,
            ElementCategory::Other => {}
        }

        self.keyword_section.is_match(text)
            || self.numbered_section.is_match(text)
            || self.is_numbered_subsection(text)
            || self.is_all_caps_heading(text)
    }

    pub fn clause_marker<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.clause_marker
            .find(text)
            .map(|found| found.as_str().trim_end())
    }

    /// Every qualifier phrase in `text`, in order, repeats included.
    pub fn qualifiers(&self, text: &str) -> Vec<String> {
        self.qualifier
            .find_iter(text)
            .map(|found| {
                found
                    .as_str()
                    .split_whitespace()
                    .collect::<Vec<&str>>()
                    .join(" ")
                    .to_lowercase()
            })
            .collect()
    }

    fn is_numbered_subsection(&self, text: &str) -> bool {
        let Some(captures) = self.numbered_subsection.captures(text) else {
            return false;
        };

        let title = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        title.starts_with(char::is_uppercase)
            && title.chars().count() <= MAX_SUBSECTION_TITLE_CHARS
            && !title.ends_with(['.', ';', ':'])
    }

    fn is_all_caps_heading(&self, text: &str) -> bool {
        if text.chars().any(char::is_lowercase) {
            return false;
        }

        self.all_caps_run
            .find(text)
            .map(|run| run.as_str().trim_end().chars().count() >= MIN_ALL_CAPS_RUN)
            .unwrap_or(false)
    }
}

fn body_kind(text: &str, category: ElementCategory) -> RecordKind {
    match category {
        ElementCategory::ListItem => RecordKind::ListItem,
        _ if mentions_annex(text) => RecordKind::Annex,
        _ => RecordKind::Text,
    }
}

pub(super) fn mentions_annex(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("annexure") || lower.contains("schedule")
}
