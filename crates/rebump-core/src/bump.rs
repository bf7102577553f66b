//! Version bump planning and execution.
//!
//! All orchestration logic lives here. The CLI is purely a display layer.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_bump`]): parse the current and new versions, build
//!    the rendering context, render the commit and tag previews, and resolve
//!    which rules run.
//! 2. **Execute** ([`BumpPlan::execute`]): rewrite the targeted files, or
//!    only report what would change in dry-run mode.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::context::{ContextBuilder, Layer, RenderContext};
use crate::datafile::DataFileError;
use crate::error::ConfigError;
use crate::files::{FileUpdate, FileUpdater, write_updates};
use crate::project::Project;
use crate::rule::ChangeRule;
use crate::targets::ResolveError;
use crate::template::{self, RenderError};
use crate::version::{Version, VersionError, VersionPartSpec};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from bump operations.
#[derive(Error, Debug)]
pub enum BumpError {
    /// A rule's template could not be rendered.
    #[error("{filename}: {source}")]
    Render {
        /// The file the rule targets.
        filename: String,
        /// The render failure.
        #[source]
        source: RenderError,
    },

    /// The commit or tag template could not be rendered.
    #[error("cannot render `{field}`: {source}")]
    Message {
        /// The configuration key holding the template.
        field: &'static str,
        /// The render failure.
        #[source]
        source: RenderError,
    },

    /// The search pattern was not found and missing versions are not ignored.
    #[error("did not find {pattern:?} in {filename}")]
    PatternNotFound {
        /// The file searched.
        filename: String,
        /// The rendered search text.
        pattern: String,
    },

    /// Reading or writing a target file failed.
    #[error("failed to {action} {path}: {source}")]
    Io {
        /// `read` or `write`.
        action: &'static str,
        /// The file involved.
        path: Utf8PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A structured data file could not be edited.
    #[error("{filename}: {source}")]
    DataFile {
        /// The file involved.
        filename: String,
        /// The data error.
        #[source]
        source: DataFileError,
    },

    /// The working tree has uncommitted changes and `allow_dirty` is off.
    #[error("working tree has uncommitted changes (set `allow_dirty = true` to bump anyway)")]
    DirtyWorkingTree,

    /// Version parsing or serialization failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// File targets could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for bump operations.
pub type BumpResult<T> = Result<T, BumpError>;

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// What the caller asked for.
#[derive(Debug, Clone, Default)]
pub struct BumpRequest {
    /// The version to move to.
    pub new_version: String,
    /// Overrides the configured `current_version`.
    pub current_version: Option<String>,
    /// Extra files to update with the top-level settings.
    pub files: Vec<String>,
}

/// A bump ready to execute.
#[derive(Debug, Clone)]
pub struct BumpPlan {
    /// The parsed current version.
    pub current: Version,
    /// The parsed new version.
    pub new: Version,
    /// `current` rendered with the top-level `serialize` formats.
    pub current_version: String,
    /// `new` rendered with the top-level `serialize` formats.
    pub new_version: String,
    /// Commit message preview, when `commit` is on.
    pub commit_message: Option<String>,
    /// Tag name preview, when `tag` is on.
    pub tag_name: Option<String>,
    /// Tag message preview, when `tag` is on.
    pub tag_message: Option<String>,
    /// The rules that will run, in order.
    pub rules: Vec<ChangeRule>,
    context: RenderContext,
    parts: IndexMap<String, VersionPartSpec>,
}

/// Plan a version bump for `project`.
///
/// Files named in `request` are added to the project and always included.
///
/// # Errors
///
/// Fails when no current version is known, either version does not parse,
/// the working tree is dirty without `allow_dirty`, a preview template
/// cannot be rendered, or targets cannot be resolved.
#[instrument(skip_all, fields(root = %project.root(), new = %request.new_version))]
pub fn plan_bump(project: &mut Project, request: &BumpRequest) -> BumpResult<BumpPlan> {
    let config = project.config();
    let current_raw = request
        .current_version
        .as_deref()
        .or(config.current_version.as_deref())
        .ok_or(VersionError::NoCurrentVersion)?
        .to_owned();

    if !config.allow_dirty && project.scm_info().is_dirty() {
        return Err(BumpError::DirtyWorkingTree);
    }

    let versions = project.version_config();
    let current = versions.parse(&current_raw)?;
    let new = versions.parse(&request.new_version)?;

    let context = ContextBuilder::new(Some(current_raw.as_str()))
        .with_scm_info(project.scm_info().clone())
        .build(Some(&current), Some(&new));
    let current_version = versions.serialize(&current, &context)?;
    let new_version = versions.serialize(&new, &context)?;
    debug!(%current_version, %new_version, "serialized versions");

    let mut layer = Layer::new();
    layer.insert("current_version".into(), current_version.as_str().into());
    layer.insert("new_version".into(), new_version.as_str().into());
    let messages = context.with_layer(layer);
    let preview = |enabled: bool, field: &'static str, text: &str| {
        enabled
            .then(|| template::render(text, &messages))
            .transpose()
            .map_err(|source| BumpError::Message { field, source })
    };
    let commit_message = preview(config.commit, "message", &config.message)?;
    let tag_name = preview(config.tag, "tag_name", &config.tag_name)?;
    let tag_message = preview(config.tag, "tag_message", &config.tag_message)?;
    let parts = config.parts.clone();

    project.add_files(request.files.iter().cloned());
    let rules = project.files_to_modify()?;
    info!(
        %current_version,
        %new_version,
        rules = rules.len(),
        "planned bump"
    );

    Ok(BumpPlan {
        current,
        new,
        current_version,
        new_version,
        commit_message,
        tag_name,
        tag_message,
        rules,
        context,
        parts,
    })
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

/// Result of a bump.
#[derive(Debug, Clone, Serialize)]
pub struct BumpOutcome {
    /// The serialized current version.
    pub current_version: String,
    /// The serialized new version.
    pub new_version: String,
    /// Every targeted file and what happened to it.
    pub files: Vec<FileUpdate>,
    /// Files written, relative to the root. Empty in dry-run mode.
    pub modified_files: Vec<Utf8PathBuf>,
    /// Whether files were left untouched.
    pub dry_run: bool,
}

impl BumpOutcome {
    /// Files whose content would change (or did).
    pub fn changed_files(&self) -> impl Iterator<Item = &FileUpdate> {
        self.files.iter().filter(|f| f.is_changed())
    }
}

impl BumpPlan {
    /// The context templates were rendered with.
    pub const fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Rewrite the targeted files under `root`.
    ///
    /// Every file is computed before any is written, so a failing rule leaves
    /// the tree untouched.
    ///
    /// # Errors
    ///
    /// Fails when a file cannot be read or written, a template cannot be
    /// rendered, or a pattern is missing and not ignored.
    #[instrument(skip(self), fields(new = %self.new_version))]
    pub fn execute(&self, root: &Utf8Path, dry_run: bool) -> BumpResult<BumpOutcome> {
        let updater = FileUpdater::new(root, &self.parts, &self.context, &self.current, &self.new);
        let files = updater.prepare(&self.rules)?;

        let modified_files = if dry_run {
            debug!("dry run, nothing written");
            Vec::new()
        } else {
            write_updates(root, &files)?
        };

        info!(
            current = %self.current_version,
            new = %self.new_version,
            modified = modified_files.len(),
            dry_run,
            "bump complete"
        );

        Ok(BumpOutcome {
            current_version: self.current_version.clone(),
            new_version: self.new_version.clone(),
            files,
            modified_files,
            dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FileConfig};
    use crate::git::ScmInfo;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)], config: Config) -> (TempDir, Project) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        for (name, body) in files {
            fs::write(root.join(name), body).unwrap();
        }
        let project = Project::new(root, config).unwrap();
        (tmp, project)
    }

    fn file(name: &str) -> FileConfig {
        FileConfig {
            filename: Some(name.into()),
            ..FileConfig::default()
        }
    }

    fn request(new: &str) -> BumpRequest {
        BumpRequest {
            new_version: new.into(),
            ..BumpRequest::default()
        }
    }

    #[test]
    fn plans_and_executes() {
        let config = Config {
            current_version: Some("1.2.3".into()),
            commit: true,
            tag: true,
            files: vec![file("VERSION")],
            ..Config::default()
        };
        let (_tmp, mut project) = project(&[("VERSION", "1.2.3\n")], config);

        let plan = plan_bump(&mut project, &request("1.3.0")).unwrap();
        assert_eq!(plan.current_version, "1.2.3");
        assert_eq!(plan.new_version, "1.3.0");
        assert_eq!(plan.tag_name.as_deref(), Some("v1.3.0"));
        assert_eq!(
            plan.commit_message.as_deref(),
            Some("Bump version: 1.2.3 → 1.3.0")
        );
        assert_eq!(plan.rules.len(), 1);

        let outcome = plan.execute(project.root(), false).unwrap();
        assert_eq!(outcome.modified_files, vec![Utf8PathBuf::from("VERSION")]);
        assert_eq!(
            fs::read_to_string(project.root().join("VERSION")).unwrap(),
            "1.3.0\n"
        );
    }

    #[test]
    fn previews_off_by_default() {
        let config = Config {
            current_version: Some("1.2.3".into()),
            ..Config::default()
        };
        let (_tmp, mut project) = project(&[], config);
        let plan = plan_bump(&mut project, &request("1.2.4")).unwrap();
        assert!(plan.commit_message.is_none());
        assert!(plan.tag_name.is_none());
        assert!(plan.rules.is_empty());
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let config = Config {
            current_version: Some("1.2.3".into()),
            files: vec![file("VERSION")],
            ..Config::default()
        };
        let (_tmp, mut project) = project(&[("VERSION", "1.2.3")], config);
        let plan = plan_bump(&mut project, &request("2.0.0")).unwrap();
        let outcome = plan.execute(project.root(), true).unwrap();

        assert!(outcome.modified_files.is_empty());
        assert_eq!(outcome.changed_files().count(), 1);
        assert_eq!(
            fs::read_to_string(project.root().join("VERSION")).unwrap(),
            "1.2.3"
        );
    }

    #[test]
    fn failure_writes_nothing() {
        let config = Config {
            current_version: Some("1.2.3".into()),
            files: vec![file("a.txt"), file("b.txt")],
            ..Config::default()
        };
        let (_tmp, mut project) = project(&[("a.txt", "1.2.3"), ("b.txt", "0.0.0")], config);
        let plan = plan_bump(&mut project, &request("1.2.4")).unwrap();
        let err = plan.execute(project.root(), false).unwrap_err();

        assert!(matches!(err, BumpError::PatternNotFound { ref filename, .. } if filename == "b.txt"));
        assert_eq!(
            fs::read_to_string(project.root().join("a.txt")).unwrap(),
            "1.2.3"
        );
    }

    #[test]
    fn request_overrides_current_version_and_adds_files() {
        let config = Config {
            current_version: Some("0.0.1".into()),
            excluded_paths: vec!["extra.txt".into()],
            ..Config::default()
        };
        let (_tmp, mut project) = project(&[("extra.txt", "v=1.0.0")], config);
        let req = BumpRequest {
            new_version: "1.1.0".into(),
            current_version: Some("1.0.0".into()),
            files: vec!["extra.txt".into()],
        };
        let plan = plan_bump(&mut project, &req).unwrap();
        assert_eq!(plan.current_version, "1.0.0");

        plan.execute(project.root(), false).unwrap();
        assert_eq!(
            fs::read_to_string(project.root().join("extra.txt")).unwrap(),
            "v=1.1.0"
        );
    }

    #[test]
    fn missing_current_version() {
        let (_tmp, mut project) = project(&[], Config::default());
        let err = plan_bump(&mut project, &request("1.0.0")).unwrap_err();
        assert!(matches!(
            err,
            BumpError::Version(VersionError::NoCurrentVersion)
        ));
    }

    #[test]
    fn unparseable_new_version() {
        let config = Config {
            current_version: Some("1.2.3".into()),
            ..Config::default()
        };
        let (_tmp, mut project) = project(&[], config);
        let err = plan_bump(&mut project, &request("banana")).unwrap_err();
        assert!(matches!(
            err,
            BumpError::Version(VersionError::ParseFailed { .. })
        ));
    }

    #[test]
    fn dirty_tree_is_refused_unless_allowed() {
        let dirty = ScmInfo {
            tool: Some("git".into()),
            dirty: Some(true),
            ..ScmInfo::default()
        };
        let config = Config {
            current_version: Some("1.2.3".into()),
            ..Config::default()
        };
        let (_tmp, project_a) = project(&[], config.clone());
        let mut project_a = project_a.with_scm_info(dirty.clone());
        assert!(matches!(
            plan_bump(&mut project_a, &request("1.2.4")),
            Err(BumpError::DirtyWorkingTree)
        ));

        let (_tmp2, project_b) = project(
            &[],
            Config {
                allow_dirty: true,
                ..config
            },
        );
        let mut project_b = project_b.with_scm_info(dirty);
        assert!(plan_bump(&mut project_b, &request("1.2.4")).is_ok());
    }

    #[test]
    fn message_with_unknown_placeholder() {
        let config = Config {
            current_version: Some("1.2.3".into()),
            tag: true,
            tag_name: "v{nope}".into(),
            ..Config::default()
        };
        let (_tmp, mut project) = project(&[], config);
        assert!(matches!(
            plan_bump(&mut project, &request("1.2.4")),
            Err(BumpError::Message { field: "tag_name", .. })
        ));
    }
}
