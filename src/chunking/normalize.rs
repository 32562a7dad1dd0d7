use anyhow::{Context, Result};
use regex::Regex;

use super::types::DocKind;

#[derive(Debug)]
pub struct TextNormalizer {
    boilerplate: Vec<Regex>,
    email_tail: Regex,
    placeholder: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self> {
        let boilerplate = [
            (r"(?i)\bpage\s+\d+\s+of\s+\d+\b", "page-of marker"),
            (r"(?im)^[ \t]*page\s+\d+[ \t]*$", "page-number line"),
            (r"(?i)\buin\s*:?\s*[a-z0-9]*\d[a-z0-9]*\b", "UIN identifier"),
            (
                r"\b[A-Z][A-Za-z&]*(?:\s+[A-Z][A-Za-z&]*)*\s+Co\.\s*Ltd\.",
                "company line",
            ),
            (
                r"(?im)^[ \t]*(?:strictly[ \t]+)?(?:private[ \t]+and[ \t]+)?confidential[ \t]*$",
                "confidential banner",
            ),
            (r"(?i)\bthis document is\b[^.]*\.", "document disclaimer"),
            (r"(?i)\ball rights reserved\.?", "rights disclaimer"),
            (
                r"(?i)\b(?:version|ver\.|rev\.)\s*:?\s*v?\d+(?:\.\d+)*\b",
                "version tag",
            ),
        ];

        let boilerplate = boilerplate
            .into_iter()
            .map(|(pattern, label)| {
                Regex::new(pattern).with_context(|| format!("failed to compile {label} regex"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self {
            boilerplate,
            email_tail: Regex::new(
                r"(?is)(?:-{2,}\s*sent from.*|\bon [^\n]{1,200}? wrote:.*|\bbest regards,.*|\bsincerely,.*)",
            )
            .context("failed to compile email signature regex")?,
            placeholder: Regex::new(r"\[[^\]]*\]|\{[^}]*\}")
                .context("failed to compile placeholder regex")?,
        })
    }

    pub fn normalize(&self, text: &str, doc_kind: DocKind) -> String {
        let mut cleaned = match doc_kind {
            DocKind::Email => self.email_tail.replace_all(text, " ").into_owned(),
            DocKind::WordProcessor => self.placeholder.replace_all(text, " ").into_owned(),
            DocKind::Generic => text.to_string(),
        };

        for pattern in &self.boilerplate {
            cleaned = pattern.replace_all(&cleaned, " ").into_owned();
        }

        repair_hyphenation(&collapse_whitespace(&cleaned))
    }
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn repair_hyphenation(input: &str) -> String {
    let mut words = Vec::<String>::new();

    for word in input.split(' ').filter(|word| !word.is_empty()) {
        if let Some(previous) = words.last_mut() {
            if should_merge_hyphenated_pair(previous, word) {
                previous.pop();
                previous.push_str(word);
                continue;
            }
        }
        words.push(word.to_string());
    }

    words.join(" ")
}

fn should_merge_hyphenated_pair(current: &str, next: &str) -> bool {
    let Some(stem) = current.strip_suffix('-') else {
        return false;
    };

    let starts_with_lowercase = next
        .chars()
        .next()
        .map(|character| character.is_lowercase())
        .unwrap_or(false);
    if !starts_with_lowercase {
        return false;
    }

    stem.chars()
        .last()
        .map(|character| character.is_alphabetic())
        .unwrap_or(false)
}
