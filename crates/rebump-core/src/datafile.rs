//! Structured data files addressed by dotted key paths.
//!
//! `project.version` names the `version` key of the `project` table;
//! numeric segments index into arrays (`workspaces.0.version`).
//!
//! TOML documents are edited in place: comments, spacing, and every other
//! value come back exactly as they were read.

use camino::Utf8Path;
use thiserror::Error;
use toml_edit::{DocumentMut, Item};

/// Errors reading or writing a structured data file.
#[derive(Error, Debug)]
pub enum DataFileError {
    /// The JSON document could not be parsed or written.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The TOML document could not be parsed.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml_edit::TomlError),

    /// The key path exists but does not hold a string.
    #[error("value at {key_path:?} is not a string")]
    NotAString {
        /// The dotted key path.
        key_path: String,
    },
}

/// Formats that support key-path edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl DataFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        match path.extension()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// A parsed data file.
#[derive(Debug, Clone)]
pub enum DataDocument {
    /// A JSON document; object key order is kept.
    Json(serde_json::Value),
    /// A TOML document with its original formatting.
    Toml(DocumentMut),
}

impl DataDocument {
    /// Parse `content` as `format`.
    pub fn parse(format: DataFormat, content: &str) -> Result<Self, DataFileError> {
        Ok(match format {
            DataFormat::Json => Self::Json(serde_json::from_str(content)?),
            DataFormat::Toml => Self::Toml(content.parse()?),
        })
    }

    /// The string at `key_path`; `Ok(None)` when the path does not exist.
    pub fn get(&self, key_path: &str) -> Result<Option<&str>, DataFileError> {
        let not_a_string = || DataFileError::NotAString {
            key_path: key_path.to_owned(),
        };
        match self {
            Self::Json(root) => match json_lookup(root, key_path) {
                None => Ok(None),
                Some(value) => value.as_str().map(Some).ok_or_else(not_a_string),
            },
            Self::Toml(root) => match toml_lookup(root.as_item(), key_path) {
                None => Ok(None),
                Some(item) => item.as_str().map(Some).ok_or_else(not_a_string),
            },
        }
    }

    /// Replace the string at `key_path`. Returns `false` when the path does
    /// not exist.
    pub fn set(&mut self, key_path: &str, value: String) -> bool {
        match self {
            Self::Json(root) => match json_lookup_mut(root, key_path) {
                Some(slot) => {
                    *slot = serde_json::Value::String(value);
                    true
                }
                None => false,
            },
            Self::Toml(root) => match toml_lookup_mut(root.as_item_mut(), key_path)
                .and_then(Item::as_value_mut)
            {
                Some(slot) => {
                    let decor = slot.decor().clone();
                    *slot = toml_edit::Value::from(value);
                    *slot.decor_mut() = decor;
                    true
                }
                None => false,
            },
        }
    }

    /// Serialize the document. JSON is pretty-printed with a trailing
    /// newline; TOML keeps its original layout.
    pub fn render(&self) -> Result<String, DataFileError> {
        match self {
            Self::Json(root) => {
                let mut out = serde_json::to_string_pretty(root)?;
                out.push('\n');
                Ok(out)
            }
            Self::Toml(root) => Ok(root.to_string()),
        }
    }
}

fn json_lookup<'a>(root: &'a serde_json::Value, key_path: &str) -> Option<&'a serde_json::Value> {
    key_path.split('.').try_fold(root, |node, key| match node {
        serde_json::Value::Object(map) => map.get(key),
        serde_json::Value::Array(items) => items.get(key.parse::<usize>().ok()?),
        _ => None,
    })
}

fn json_lookup_mut<'a>(
    root: &'a mut serde_json::Value,
    key_path: &str,
) -> Option<&'a mut serde_json::Value> {
    key_path.split('.').try_fold(root, |node, key| match node {
        serde_json::Value::Object(map) => map.get_mut(key),
        serde_json::Value::Array(items) => items.get_mut(key.parse::<usize>().ok()?),
        _ => None,
    })
}

/// Walk tables and inline tables by key. Numeric segments index arrays and
/// arrays of tables.
fn toml_lookup<'a>(root: &'a Item, key_path: &str) -> Option<&'a Item> {
    key_path.split('.').try_fold(root, |node, key| match key.parse::<usize>() {
        Ok(index) if node.is_array() || node.is_array_of_tables() => node.get(index),
        _ => node.get(key),
    })
}

fn toml_lookup_mut<'a>(root: &'a mut Item, key_path: &str) -> Option<&'a mut Item> {
    key_path.split('.').try_fold(root, |node, key| match key.parse::<usize>() {
        Ok(index) if node.is_array() || node.is_array_of_tables() => node.get_mut(index),
        _ => node.get_mut(key),
    })
}
