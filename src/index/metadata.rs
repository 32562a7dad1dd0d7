use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;

use crate::chunking::Chunk;

/// The value shapes a vector store accepts as filterable metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    TextList(Vec<String>),
}

pub fn sanitize_value(value: Value) -> MetadataValue {
    match value {
        Value::Null => MetadataValue::Text(String::new()),
        Value::Bool(flag) => MetadataValue::Bool(flag),
        Value::Number(number) => MetadataValue::Number(number),
        Value::String(text) => MetadataValue::Text(text),
        Value::Array(items) if items.iter().all(Value::is_string) => MetadataValue::TextList(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text),
                    _ => None,
                })
                .collect(),
        ),
        other => MetadataValue::Text(other.to_string()),
    }
}

/// Flattens chunk metadata plus its heading and text into sanitized values.
pub fn sanitize_chunk_metadata(chunk: &Chunk) -> Result<BTreeMap<String, MetadataValue>> {
    let value = serde_json::to_value(&chunk.metadata).context("failed to serialize chunk metadata")?;
    let Value::Object(fields) = value else {
        bail!("chunk metadata did not serialize to an object");
    };

    let mut sanitized = fields
        .into_iter()
        .map(|(key, value)| (key, sanitize_value(value)))
        .collect::<BTreeMap<String, MetadataValue>>();
    sanitized.insert(
        "heading".to_string(),
        MetadataValue::Text(chunk.heading.clone().unwrap_or_default()),
    );
    sanitized.insert(
        "text".to_string(),
        MetadataValue::Text(chunk.chunk_text.clone()),
    );

    Ok(sanitized)
}
