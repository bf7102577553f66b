//! File target resolution and the inclusion policy.
//!
//! Declared [`ChangeRule`]s are expanded into a [`ResolvedFileMap`]: glob
//! rules become one rule per matching file, explicit rules pass through.
//! [`effective_rules`] then decides which of those files are modified.

use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::rule::{ChangeRule, RuleTarget};

/// Errors from target resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The glob pattern itself is invalid.
    #[error("invalid glob {glob:?}: {source}")]
    InvalidGlob {
        /// The glob as configured.
        glob: String,
        /// Parse failure.
        #[source]
        source: glob::PatternError,
    },

    /// A directory entry could not be read while expanding a glob.
    #[error("failed to expand glob {glob:?}: {source}")]
    GlobExpansion {
        /// The glob as configured.
        glob: String,
        /// Read failure.
        #[source]
        source: glob::GlobError,
    },

    /// A glob matched a path that is not valid UTF-8.
    #[error("glob {glob:?} matched a non UTF-8 path: {}", path.display())]
    NonUtf8Path {
        /// The glob as configured.
        glob: String,
        /// The offending path.
        path: PathBuf,
    },
}

/// Result alias for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Concrete filename to the rules that apply to it, in declaration order.
pub type ResolvedFileMap = IndexMap<String, Vec<ChangeRule>>;

/// Expand `rules` against the files under `root`.
///
/// # Errors
///
/// Returns an error when a glob is invalid or cannot be expanded.
#[instrument(skip(rules), fields(rules = rules.len()))]
pub fn resolve(root: &Utf8Path, rules: &[ChangeRule]) -> ResolveResult<ResolvedFileMap> {
    let mut map = ResolvedFileMap::new();
    for rule in rules {
        match rule.target() {
            Some(RuleTarget::File(filename)) => {
                map.entry(filename.to_owned()).or_default().push(rule.clone());
            }
            Some(RuleTarget::Glob(glob)) => {
                for filename in expand_glob(root, glob)? {
                    let derived = rule.for_file(filename.as_str());
                    map.entry(filename).or_default().push(derived);
                }
            }
            None => warn!(search = %rule.search, "skipping rule without a filename or glob"),
        }
    }
    debug!(files = map.len(), "resolved file targets");
    Ok(map)
}

/// Apply the inclusion policy to a resolved map.
///
/// A file is kept when it is listed in `included` or is not listed in
/// `excluded`. Inclusion wins; it never adds files absent from `map`.
pub fn effective_rules(
    map: &ResolvedFileMap,
    included: &[String],
    excluded: &[String],
) -> Vec<ChangeRule> {
    map.iter()
        .filter(|(filename, _)| included.contains(filename) || !excluded.contains(filename))
        .flat_map(|(_, rules)| rules.iter().cloned())
        .collect()
}

/// Glob matches as sorted, deduplicated paths relative to `root`.
fn expand_glob(root: &Utf8Path, glob: &str) -> ResolveResult<Vec<String>> {
    let full = if Utf8Path::new(glob).is_absolute() {
        glob.to_owned()
    } else {
        format!("{}/{glob}", Pattern::escape(root.as_str()))
    };
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let entries = glob::glob_with(&full, options).map_err(|source| ResolveError::InvalidGlob {
        glob: glob.to_owned(),
        source,
    })?;

    let mut matches = IndexSet::new();
    for entry in entries {
        let path = entry.map_err(|source| ResolveError::GlobExpansion {
            glob: glob.to_owned(),
            source,
        })?;
        if !path.is_file() {
            continue;
        }
        let path = Utf8PathBuf::try_from(path).map_err(|e| ResolveError::NonUtf8Path {
            glob: glob.to_owned(),
            path: e.into_path_buf(),
        })?;
        let relative = path.strip_prefix(root).unwrap_or(&path);
        matches.insert(relative.as_str().replace('\\', "/"));
    }

    let mut matches: Vec<String> = matches.into_iter().collect();
    matches.sort();
    debug!(%glob, matches = matches.len(), "expanded glob");
    Ok(matches)
}

/// The declared rules of a project plus a lazily resolved file map.
#[derive(Debug, Clone, Default)]
pub struct FileTargets {
    declared: Vec<ChangeRule>,
    included: Vec<String>,
    excluded: Vec<String>,
    cache: Option<ResolvedFileMap>,
}

impl FileTargets {
    /// Create a target set.
    pub fn new(declared: Vec<ChangeRule>, included: Vec<String>, excluded: Vec<String>) -> Self {
        Self {
            declared,
            included,
            excluded,
            cache: None,
        }
    }

    /// The declared rules.
    pub fn declared(&self) -> &[ChangeRule] {
        &self.declared
    }

    /// Paths always modified, even when excluded.
    pub fn included(&self) -> &[String] {
        &self.included
    }

    /// Paths skipped unless included.
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Append a rule.
    pub fn push(&mut self, rule: ChangeRule) {
        self.declared.push(rule);
        self.invalidate();
    }

    /// Append one rule per filename, each a copy of `template`.
    pub fn add_files<I, S>(&mut self, filenames: I, template: &ChangeRule)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared
            .extend(filenames.into_iter().map(|name| template.for_file(name)));
        self.invalidate();
    }

    /// Mark paths as included.
    pub fn include<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included.extend(paths.into_iter().map(Into::into));
    }

    /// Drop the cached map.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Whether the map is cached.
    pub const fn is_resolved(&self) -> bool {
        self.cache.is_some()
    }

    /// The resolved map, computing it on first access.
    ///
    /// # Errors
    ///
    /// Returns an error when a glob cannot be expanded.
    pub fn resolved_filemap(&mut self, root: &Utf8Path) -> ResolveResult<&ResolvedFileMap> {
        if self.cache.is_none() {
            self.cache = Some(resolve(root, &self.declared)?);
        }
        Ok(self.cache.get_or_insert_default())
    }

    /// The rules left after the inclusion policy, in map order.
    ///
    /// # Errors
    ///
    /// Returns an error when a glob cannot be expanded.
    pub fn files_to_modify(&mut self, root: &Utf8Path) -> ResolveResult<Vec<ChangeRule>> {
        let included = self.included.clone();
        let excluded = self.excluded.clone();
        let map = self.resolved_filemap(root)?;
        Ok(effective_rules(map, &included, &excluded))
    }
}
