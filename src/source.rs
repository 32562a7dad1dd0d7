use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::{DocKind, ParsedElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    ElementJson,
    Pdf,
    Text,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Self::ElementJson,
            Some("pdf") => Self::Pdf,
            _ => Self::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ElementJson => "element_json",
            Self::Pdf => "pdf",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub source_path: PathBuf,
    pub filename: String,
    pub format: SourceFormat,
    pub doc_kind: DocKind,
    pub elements: Vec<ParsedElement>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ElementDump {
    Envelope {
        #[serde(default)]
        filename: Option<String>,
        elements: Vec<ParsedElement>,
    },
    Bare(Vec<ParsedElement>),
}

/// Loads a local document as parsed elements. An explicit `doc_kind` wins over
/// the one implied by the file name.
pub fn load_document(path: &Path, doc_kind: Option<DocKind>) -> Result<LoadedDocument> {
    if !path.is_file() {
        bail!("input document does not exist: {}", path.display());
    }

    let format = SourceFormat::from_path(path);
    let mut filename = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or_default()
        .to_string();

    let elements = match format {
        SourceFormat::ElementJson => {
            let raw =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            let (dump_filename, elements) = parse_element_dump(&raw)
                .with_context(|| format!("failed to parse element dump {}", path.display()))?;
            if let Some(dump_filename) = dump_filename.filter(|value| !value.trim().is_empty()) {
                filename = dump_filename;
            }
            elements
        }
        SourceFormat::Pdf => elements_from_pages(&extract_pages_with_pdftotext(path)?),
        SourceFormat::Text => {
            let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            elements_from_pages(&split_pages(&String::from_utf8_lossy(&raw)))
        }
    };

    let doc_kind = doc_kind.unwrap_or_else(|| DocKind::from_path(Path::new(&filename)));

    info!(
        path = %path.display(),
        format = format.as_str(),
        doc_kind = doc_kind.as_str(),
        elements = elements.len(),
        "loaded source document"
    );

    Ok(LoadedDocument {
        source_path: path.to_path_buf(),
        filename,
        format,
        doc_kind,
        elements,
    })
}

pub fn parse_element_dump(raw: &[u8]) -> Result<(Option<String>, Vec<ParsedElement>)> {
    let dump: ElementDump =
        serde_json::from_slice(raw).context("expected an element array or {\"elements\": [...]}")?;

    Ok(match dump {
        ElementDump::Envelope { filename, elements } => (filename, elements),
        ElementDump::Bare(elements) => (None, elements),
    })
}

/// One element per blank-line separated paragraph, numbered by page.
pub fn elements_from_pages(pages: &[String]) -> Vec<ParsedElement> {
    let mut elements = Vec::<ParsedElement>::new();

    for (index, page) in pages.iter().enumerate() {
        let page_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let mut paragraph = Vec::<&str>::new();

        for line in page.lines() {
            if line.trim().is_empty() {
                push_paragraph(&mut elements, &mut paragraph, page_number);
                continue;
            }
            paragraph.push(line.trim_end());
        }
        push_paragraph(&mut elements, &mut paragraph, page_number);
    }

    debug!(pages = pages.len(), elements = elements.len(), "split pages into elements");
    elements
}

fn push_paragraph(elements: &mut Vec<ParsedElement>, paragraph: &mut Vec<&str>, page_number: u32) {
    if paragraph.is_empty() {
        return;
    }

    elements.push(ParsedElement::new(paragraph.join("\n")).with_page(page_number));
    paragraph.clear();
}

fn split_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}

fn extract_pages_with_pdftotext(pdf_path: &Path) -> Result<Vec<String>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg("-layout")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
}
