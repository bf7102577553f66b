//! Reading, rewriting, and writing target files.
//!
//! Updates happen in two steps. [`FileUpdater::prepare`] computes the new
//! content of every targeted file in memory, failing before anything is
//! written. [`write_updates`] then persists the changed files, each through
//! a temporary file in the same directory.

use std::borrow::Cow;
use std::fs;
use std::io::Write as _;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::NoExpand;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::bump::{BumpError, BumpResult};
use crate::context::{Layer, RenderContext};
use crate::datafile::{DataDocument, DataFormat};
use crate::pattern::{SearchPattern, render_search_pattern};
use crate::rule::ChangeRule;
use crate::template;
use crate::version::{Version, VersionConfig, VersionPartSpec};

/// The computed change to one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileUpdate {
    /// Path relative to the project root.
    pub filename: String,
    /// Content before any rule ran.
    #[serde(skip)]
    pub before: String,
    /// Content after every rule ran.
    #[serde(skip)]
    pub after: String,
    /// Rules that found their pattern.
    pub applied: usize,
    /// Rules skipped because the pattern was missing.
    pub skipped: usize,
}

impl FileUpdate {
    /// Whether the content differs.
    pub fn is_changed(&self) -> bool {
        self.before != self.after
    }
}

/// Applies change rules for one pair of versions.
#[derive(Debug)]
pub struct FileUpdater<'a> {
    root: &'a Utf8Path,
    parts: &'a IndexMap<String, VersionPartSpec>,
    context: &'a RenderContext,
    current: &'a Version,
    new: &'a Version,
}

impl<'a> FileUpdater<'a> {
    /// Create an updater. `context` should already carry the `current_` and
    /// `new_` part layers.
    pub const fn new(
        root: &'a Utf8Path,
        parts: &'a IndexMap<String, VersionPartSpec>,
        context: &'a RenderContext,
        current: &'a Version,
        new: &'a Version,
    ) -> Self {
        Self {
            root,
            parts,
            context,
            current,
            new,
        }
    }

    /// Compute new contents for every file `rules` target.
    ///
    /// Rules for the same file run in order against the evolving content.
    /// Files come back in the order they first appear in `rules`.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable file, render failure, or missing
    /// pattern without `ignore_missing_version`.
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub fn prepare(&self, rules: &[ChangeRule]) -> BumpResult<Vec<FileUpdate>> {
        let mut grouped: IndexMap<&str, Vec<&ChangeRule>> = IndexMap::new();
        for rule in rules {
            if let Some(filename) = rule.filename.as_deref() {
                grouped.entry(filename).or_default().push(rule);
            }
        }

        grouped
            .into_iter()
            .map(|(filename, rules)| self.prepare_file(filename, &rules))
            .collect()
    }

    fn prepare_file(&self, filename: &str, rules: &[&ChangeRule]) -> BumpResult<FileUpdate> {
        let path = self.root.join(filename);
        let before = fs::read_to_string(&path).map_err(|source| BumpError::Io {
            action: "read",
            path: path.clone(),
            source,
        })?;

        let mut after = before.clone();
        let (mut applied, mut skipped) = (0, 0);
        for rule in rules {
            match self.apply(filename, rule, &after)? {
                Some(content) => {
                    after = content;
                    applied += 1;
                }
                None => skipped += 1,
            }
        }

        debug!(%filename, applied, skipped, changed = before != after, "prepared file");
        Ok(FileUpdate {
            filename: filename.to_owned(),
            before,
            after,
            applied,
            skipped,
        })
    }

    /// Run one rule. `None` means the pattern was missing and ignored.
    fn apply(&self, filename: &str, rule: &ChangeRule, content: &str) -> BumpResult<Option<String>> {
        let context = self.rule_context(rule)?;

        let Some(key_path) = rule.key_path.as_deref() else {
            return self.replace_text(filename, rule, &context, content);
        };
        let Some(format) = DataFormat::from_path(Utf8Path::new(filename)) else {
            warn!(%filename, %key_path, "key_path only works for .json and .toml files, editing as text");
            return self.replace_text(filename, rule, &context, content);
        };

        let data_error = |source| BumpError::DataFile {
            filename: filename.to_owned(),
            source,
        };
        let mut document = DataDocument::parse(format, content).map_err(data_error)?;
        let Some(value) = document.get(key_path).map_err(data_error)? else {
            return self.missing(
                filename,
                rule,
                format!("{key_path} (key path)"),
            );
        };
        let Some(replaced) = self.replace_text(filename, rule, &context, value)? else {
            return Ok(None);
        };
        document.set(key_path, replaced);
        document.render().map(Some).map_err(data_error)
    }

    /// The shared context plus this rule's serialized versions.
    fn rule_context(&self, rule: &ChangeRule) -> BumpResult<RenderContext> {
        let versions = VersionConfig::new(&rule.parse, &rule.serialize, self.parts)?;
        let mut layer = Layer::new();
        layer.insert(
            "current_version".into(),
            versions.serialize(self.current, self.context)?.into(),
        );
        layer.insert(
            "new_version".into(),
            versions.serialize(self.new, self.context)?.into(),
        );
        Ok(self.context.with_layer(layer))
    }

    fn replace_text(
        &self,
        filename: &str,
        rule: &ChangeRule,
        context: &RenderContext,
        content: &str,
    ) -> BumpResult<Option<String>> {
        let render_error = |source| BumpError::Render {
            filename: filename.to_owned(),
            source,
        };
        let pattern = render_search_pattern(rule, context).map_err(render_error)?;
        // An empty pattern would match between every character.
        if pattern.raw.is_empty() {
            return self.missing(filename, rule, pattern.raw);
        }
        let (pattern, context) = if pattern.is_match(content) {
            (pattern, Cow::Borrowed(context))
        } else if let Some(found) = self.retry_with_original(rule, context, content, filename)? {
            found
        } else {
            return self.missing(filename, rule, pattern.raw);
        };

        let replacement = template::render(&rule.replace, &context).map_err(render_error)?;
        let replaced = substitute(&pattern, rule.regex, content, &replacement);
        debug!(%filename, search = %pattern.raw, %replacement, "replaced");
        Ok(Some(replaced))
    }

    /// Match again using the current version exactly as it was given.
    fn retry_with_original<'c>(
        &self,
        rule: &ChangeRule,
        context: &RenderContext,
        content: &str,
        filename: &str,
    ) -> BumpResult<Option<(SearchPattern, Cow<'c, RenderContext>)>> {
        let Some(original) = self.current.original() else {
            return Ok(None);
        };
        let serialized = context.get("current_version").map(ToString::to_string);
        if serialized.as_deref() == Some(original) {
            return Ok(None);
        }

        let mut layer = Layer::new();
        layer.insert("current_version".into(), original.into());
        let retry = context.with_layer(layer);
        let pattern = render_search_pattern(rule, &retry).map_err(|source| BumpError::Render {
            filename: filename.to_owned(),
            source,
        })?;
        if pattern.is_match(content) {
            debug!(%filename, %original, "matched using the original current version");
            Ok(Some((pattern, Cow::Owned(retry))))
        } else {
            Ok(None)
        }
    }

    fn missing(&self, filename: &str, rule: &ChangeRule, pattern: String) -> BumpResult<Option<String>> {
        if rule.ignore_missing_version {
            info!(%filename, %pattern, "pattern not found, skipping");
            return Ok(None);
        }
        Err(BumpError::PatternNotFound {
            filename: filename.to_owned(),
            pattern,
        })
    }
}

/// Replace every match. Regex rules expand `$1` and `${name}` unless the
/// matcher fell back to literal text.
fn substitute(pattern: &SearchPattern, regex: bool, content: &str, replacement: &str) -> String {
    if regex && !pattern.fell_back() {
        pattern.matcher.replace_all(content, replacement).into_owned()
    } else {
        pattern
            .matcher
            .replace_all(content, NoExpand(replacement))
            .into_owned()
    }
}

/// Write every changed update under `root`.
///
/// Returns the paths written, relative to `root`.
///
/// # Errors
///
/// Fails on the first file that cannot be written.
#[instrument(skip(updates), fields(%root, files = updates.len()))]
pub fn write_updates(root: &Utf8Path, updates: &[FileUpdate]) -> BumpResult<Vec<Utf8PathBuf>> {
    let mut written = Vec::new();
    for update in updates.iter().filter(|u| u.is_changed()) {
        let path = root.join(&update.filename);
        write_atomic(&path, &update.after)?;
        info!(file = %update.filename, "updated");
        written.push(Utf8PathBuf::from(&update.filename));
    }
    Ok(written)
}

fn write_atomic(path: &Utf8Path, content: &str) -> BumpResult<()> {
    let io_error = |source| BumpError::Io {
        action: "write",
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    tmp.write_all(content.as_bytes()).map_err(io_error)?;
    if let Ok(metadata) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(io_error)?;
    }
    tmp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}
