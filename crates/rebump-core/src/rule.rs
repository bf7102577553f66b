//! Change rules: one find-and-replace operation scoped to a target.

use serde::{Deserialize, Serialize};

/// What a rule points at, after applying glob-over-filename precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget<'a> {
    /// A glob to expand into concrete files.
    Glob(&'a str),
    /// A single concrete file.
    File(&'a str),
}

/// One declared find-and-replace operation.
///
/// `filename` and `glob` are exclusive; when both are set, `glob` wins and
/// the rule is expanded. `key_path` narrows the change to one value of a
/// structured data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRule {
    /// Regex used to parse versions for this rule.
    pub parse: String,
    /// Serialization formats, most specific first.
    pub serialize: Vec<String>,
    /// Template for the text to find.
    pub search: String,
    /// Template for the replacement text.
    pub replace: String,
    /// Treat the rendered `search` as a regular expression.
    pub regex: bool,
    /// Skip instead of failing when `search` is not found.
    pub ignore_missing_version: bool,
    /// Concrete target file, relative to the project root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Glob expanding to target files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
    /// Dotted key path into a JSON or TOML file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
}

impl ChangeRule {
    /// The rule's target; `None` when neither `glob` nor `filename` is set.
    pub fn target(&self) -> Option<RuleTarget<'_>> {
        match (self.glob.as_deref(), self.filename.as_deref()) {
            (Some(glob), _) => Some(RuleTarget::Glob(glob)),
            (None, Some(file)) => Some(RuleTarget::File(file)),
            (None, None) => None,
        }
    }

    /// A copy of this rule aimed at one concrete file produced by its glob.
    #[must_use]
    pub fn for_file(&self, filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            glob: None,
            ..self.clone()
        }
    }
}
