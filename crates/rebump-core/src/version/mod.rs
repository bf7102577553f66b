//! Version strings: parsing into named parts and serializing back.
//!
//! A version is parsed with the configured `parse` regex; every named group
//! becomes a part. Serializing picks one of the configured `serialize`
//! formats, preferring the shortest one that still represents every part
//! that is not at its optional value.
//!
//! Incrementing parts is not handled here; the new version is always given.

mod part;

pub use part::{VersionPart, VersionPartSpec};

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::context::{Layer, RenderContext};
use crate::template::{self, RenderError};

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The `parse` pattern is not a valid regex.
    #[error("invalid parse pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern, with comments stripped.
        pattern: String,
        /// The compile error.
        #[source]
        source: regex::Error,
    },

    /// A version string did not match the `parse` pattern.
    #[error("version {version:?} does not match parse pattern {pattern:?}")]
    ParseFailed {
        /// The string that failed to parse.
        version: String,
        /// The pattern it was matched against.
        pattern: String,
    },

    /// A serialize format could not be rendered.
    #[error("cannot serialize with format {format:?}: {source}")]
    MissingValue {
        /// The offending format.
        format: String,
        /// The render failure.
        #[source]
        source: RenderError,
    },

    /// No `serialize` formats are configured.
    #[error("at least one serialize format is required")]
    NoSerializeFormats,

    /// Neither the configuration nor the command line gave a current version.
    #[error("no current version configured (set `current_version` or pass --current-version)")]
    NoCurrentVersion,
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// A parsed version: ordered parts plus the string it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    parts: IndexMap<String, VersionPart>,
    original: Option<String>,
}

impl Version {
    /// Build a version from parts in order.
    pub fn new(parts: IndexMap<String, VersionPart>, original: Option<String>) -> Self {
        Self { parts, original }
    }

    /// The part called `name`.
    pub fn get(&self, name: &str) -> Option<&VersionPart> {
        self.parts.get(name)
    }

    /// Part names and values, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parts
            .iter()
            .map(|(name, part)| (name.as_str(), part.value()))
    }

    /// The string this version was parsed from, if any.
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// Names that a serialization must include to be complete: every part
    /// up to and including the last one that is not at its optional value.
    fn required_labels(&self) -> Vec<&str> {
        let last_required = self
            .parts
            .values()
            .rposition(|part| !part.is_optional());
        match last_required {
            Some(idx) => self.parts.keys().take(idx + 1).map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    fn as_layer(&self) -> Layer {
        self.iter()
            .map(|(name, value)| (name.to_owned(), value.into()))
            .collect()
    }
}

/// Parsing and serialization rules for versions.
#[derive(Debug, Clone)]
pub struct VersionConfig {
    parse: Regex,
    serialize: Vec<String>,
    parts: IndexMap<String, VersionPartSpec>,
}

impl VersionConfig {
    /// Compile a version configuration.
    ///
    /// `parse` is compiled in verbose mode: whitespace and `#` comments are
    /// ignored, so a literal `#` or space must be escaped. Parts named in
    /// `parse` without an entry in `parts` are numeric.
    pub fn new(
        parse: &str,
        serialize: &[String],
        parts: &IndexMap<String, VersionPartSpec>,
    ) -> VersionResult<Self> {
        if serialize.is_empty() {
            return Err(VersionError::NoSerializeFormats);
        }
        let regex = RegexBuilder::new(parse)
            .ignore_whitespace(true)
            .build()
            .map_err(|source| VersionError::InvalidPattern {
                pattern: parse.to_owned(),
                source,
            })?;

        let parts = regex
            .capture_names()
            .flatten()
            .map(|name| {
                let spec = parts.get(name).cloned().unwrap_or_default();
                (name.to_owned(), spec)
            })
            .collect();

        Ok(Self {
            parse: regex,
            serialize: serialize.to_vec(),
            parts,
        })
    }

    /// Part names in the order the `parse` pattern declares them.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// The compiled parse pattern.
    pub fn parse_pattern(&self) -> &str {
        self.parse.as_str()
    }

    /// Parse a version string.
    #[instrument(skip(self), fields(pattern = %self.parse.as_str()))]
    pub fn parse(&self, version: &str) -> VersionResult<Version> {
        let captures = self
            .parse
            .captures(version)
            .ok_or_else(|| VersionError::ParseFailed {
                version: version.to_owned(),
                pattern: self.parse.as_str().to_owned(),
            })?;

        let parts = self
            .parts
            .iter()
            .map(|(name, spec)| {
                let value = captures.name(name).map(|m| m.as_str().to_owned());
                (name.clone(), VersionPart::new(value, spec.clone()))
            })
            .collect();

        let parsed = Version::new(parts, Some(version.to_owned()));
        debug!(parts = ?parsed.iter().collect::<Vec<_>>(), "parsed version");
        Ok(parsed)
    }

    /// Serialize a version, with `context` available to the formats.
    ///
    /// Version parts shadow context keys of the same name.
    pub fn serialize(&self, version: &Version, context: &RenderContext) -> VersionResult<String> {
        let values = context.with_layer(version.as_layer());
        let format = self.choose_format(version, &values)?;
        let serialized =
            template::render(format, &values).map_err(|source| VersionError::MissingValue {
                format: format.to_owned(),
                source,
            })?;
        debug!(%format, %serialized, "serialized version");
        Ok(serialized)
    }

    fn choose_format(&self, version: &Version, values: &RenderContext) -> VersionResult<&str> {
        let required = version.required_labels();
        let mut chosen: Option<(&str, usize)> = None;

        for format in &self.serialize {
            let missing = |source| VersionError::MissingValue {
                format: format.clone(),
                source,
            };
            template::render(format, values).map_err(missing)?;
            let labels = template::labels(format).map_err(missing)?;

            let complete = required.iter().all(|name| labels.contains(name));
            if !complete {
                continue;
            }
            if chosen.is_none_or(|(_, count)| labels.len() < count) {
                chosen = Some((format, labels.len()));
            }
        }

        // Nothing represents the version fully; the first format is the
        // configured default.
        Ok(chosen.map_or(self.serialize[0].as_str(), |(format, _)| format))
    }
}
