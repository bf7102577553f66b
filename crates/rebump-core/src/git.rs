//! Git metadata for the rendering context.
//!
//! Shells out to `git` so the user's configuration (safe directories,
//! worktrees, alternates) applies. Only reads; commits and tags are created
//! elsewhere.

use std::process::Command;

use camino::Utf8Path;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "describe").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Snapshot of source-control state.
///
/// Every field becomes a context key of the same name. Fields that could not
/// be determined render as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScmInfo {
    /// The SCM tool in use (`git`), or `None` outside a repository.
    pub tool: Option<String>,
    /// Full hash of `HEAD`.
    pub commit_sha: Option<String>,
    /// Commits between the latest version tag and `HEAD`.
    pub distance_to_latest_tag: Option<u32>,
    /// Version extracted from the latest version tag.
    pub current_version: Option<String>,
    /// The latest version tag.
    pub current_tag: Option<String>,
    /// Current branch, `None` when detached.
    pub branch_name: Option<String>,
    /// Branch name reduced to `[a-z0-9_]`, at most 20 characters.
    pub short_branch_name: Option<String>,
    /// Top-level directory of the working tree.
    pub repository_root: Option<String>,
    /// Whether the working tree has uncommitted changes.
    pub dirty: Option<bool>,
}

impl ScmInfo {
    /// Field names and rendered values, in declaration order.
    ///
    /// Absent values render empty, except `current_version`, which is left
    /// out so it cannot stand in for a version that was never configured.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        fn text(value: Option<&String>) -> String {
            value.cloned().unwrap_or_default()
        }
        let mut fields = vec![
            ("tool", text(self.tool.as_ref())),
            ("commit_sha", text(self.commit_sha.as_ref())),
            (
                "distance_to_latest_tag",
                self.distance_to_latest_tag
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            ),
            ("current_tag", text(self.current_tag.as_ref())),
            ("branch_name", text(self.branch_name.as_ref())),
            ("short_branch_name", text(self.short_branch_name.as_ref())),
            ("repository_root", text(self.repository_root.as_ref())),
            (
                "dirty",
                self.dirty.map(|d| d.to_string()).unwrap_or_default(),
            ),
        ];
        if let Some(ref version) = self.current_version {
            fields.insert(3, ("current_version", version.clone()));
        }
        fields
    }

    /// Whether the snapshot reports uncommitted changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty.unwrap_or(false)
    }
}

/// Parsed output of `git describe --long --dirty`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Describe {
    tag: String,
    distance: u32,
    sha: String,
    dirty: bool,
}

/// Whether a `git` executable is on `PATH`.
pub fn git_available() -> bool {
    which::which("git").is_ok()
}

/// Collect SCM metadata for the repository containing `root`.
///
/// `tag_name` is the configured tag template (e.g. `v{new_version}`); it
/// selects which tags count as version tags and how to pull the version out
/// of one. Outside a repository, or without `git`, returns an empty
/// snapshot.
#[instrument(skip(tag_name), fields(%root))]
pub fn scm_info(root: &Utf8Path, tag_name: &str) -> GitResult<ScmInfo> {
    if !git_available() {
        debug!("git not found on PATH");
        return Ok(ScmInfo::default());
    }
    if !is_inside_repo(root)? {
        debug!("not inside a git repository");
        return Ok(ScmInfo::default());
    }

    let mut info = ScmInfo {
        tool: Some("git".into()),
        repository_root: Some(git(root, &["rev-parse", "--show-toplevel"])?.trim().to_string()),
        ..ScmInfo::default()
    };

    if let Some(branch) = current_branch(root)? {
        info.short_branch_name = Some(short_branch_name(&branch));
        info.branch_name = Some(branch);
    }

    let pattern = format!("--match={}", tag_name.replace("{new_version}", "*"));
    let described = git(
        root,
        &["describe", "--dirty", "--tags", "--long", "--abbrev=40", &pattern],
    );
    match described.ok().and_then(|out| parse_describe(out.trim())) {
        Some(describe) => {
            info.current_version = version_from_tag(&describe.tag, tag_name);
            info.current_tag = Some(describe.tag);
            info.distance_to_latest_tag = Some(describe.distance);
            info.commit_sha = Some(describe.sha);
            info.dirty = Some(describe.dirty);
        }
        None => {
            debug!("no version tags reachable from HEAD");
            info.commit_sha = git(root, &["rev-parse", "HEAD"])
                .ok()
                .map(|sha| sha.trim().to_string());
            info.dirty = Some(!is_clean(root)?);
        }
    }

    debug!(?info, "collected scm info");
    Ok(info)
}

/// Check whether the working tree is clean (no uncommitted changes).
#[instrument]
pub fn is_clean(root: &Utf8Path) -> GitResult<bool> {
    let output = git(root, &["status", "--porcelain", "--untracked-files=no"])?;
    let clean = output.trim().is_empty();
    debug!(clean, "working tree status");
    Ok(clean)
}

/// Get the current branch name.
///
/// Returns `None` if in a detached HEAD state.
#[instrument]
pub fn current_branch(root: &Utf8Path) -> GitResult<Option<String>> {
    let output = git(root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let branch = output.trim().to_string();
    if branch == "HEAD" {
        debug!("detached HEAD");
        Ok(None)
    } else {
        debug!(%branch, "current branch");
        Ok(Some(branch))
    }
}

/// Check if `root` is inside a git working tree.
#[instrument]
pub fn is_inside_repo(root: &Utf8Path) -> GitResult<bool> {
    let result = git(root, &["rev-parse", "--is-inside-work-tree"]);
    match result {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Reduce a branch name to lower-case `[a-z0-9_]`, at most 20 characters.
fn short_branch_name(branch: &str) -> String {
    branch
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .take(20)
        .collect()
}

/// Parse `v1.2.3-4-g<sha>[-dirty]`.
fn parse_describe(output: &str) -> Option<Describe> {
    let (rest, dirty) = match output.strip_suffix("-dirty") {
        Some(rest) => (rest, true),
        None => (output, false),
    };
    let mut pieces = rest.rsplitn(3, '-');
    let sha = pieces.next()?.strip_prefix('g')?;
    let distance = pieces.next()?.parse().ok()?;
    let tag = pieces.next()?;
    if tag.is_empty() {
        return None;
    }
    Some(Describe {
        tag: tag.to_string(),
        distance,
        sha: sha.to_string(),
        dirty,
    })
}

/// Extract the version from a tag using the tag template.
///
/// Escape the template, then turn the escaped `{new_version}` into a capture.
fn version_from_tag(tag: &str, tag_name: &str) -> Option<String> {
    let escaped = regex::escape(tag_name);
    let pattern = escaped.replacen(r"\{new_version\}", "(?P<version>.+)", 1);
    let re = Regex::new(&format!("^{pattern}$")).ok()?;
    re.captures(tag)
        .and_then(|caps| caps.name("version"))
        .map(|m| m.as_str().to_string())
}

/// Run a git command in `root` and return its stdout.
fn git(root: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root.as_std_path())
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        // Detect "not a git repo" specifically
        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn run(root: &Utf8Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(root.as_std_path())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        run(&root, &["init", "--quiet", "--initial-branch=main"]);
        run(&root, &["config", "user.email", "dev@example.com"]);
        run(&root, &["config", "user.name", "Dev"]);
        run(&root, &["config", "commit.gpgsign", "false"]);
        run(&root, &["config", "tag.gpgsign", "false"]);
        std::fs::write(root.join("VERSION"), "1.2.3\n").unwrap();
        run(&root, &["add", "VERSION"]);
        run(&root, &["commit", "--quiet", "-m", "init"]);
        (tmp, root)
    }

    #[test]
    fn parse_describe_clean() {
        let sha = "a".repeat(40);
        let parsed = parse_describe(&format!("v1.2.3-4-g{sha}")).unwrap();
        assert_eq!(
            parsed,
            Describe {
                tag: "v1.2.3".into(),
                distance: 4,
                sha,
                dirty: false,
            }
        );
    }

    #[test]
    fn parse_describe_dirty_with_dashed_tag() {
        let parsed = parse_describe("release-1.0.0-rc-0-gabc123-dirty").unwrap();
        assert_eq!(parsed.tag, "release-1.0.0-rc");
        assert_eq!(parsed.distance, 0);
        assert_eq!(parsed.sha, "abc123");
        assert!(parsed.dirty);
    }

    #[test]
    fn parse_describe_rejects_garbage() {
        assert!(parse_describe("v1.2.3").is_none());
        assert!(parse_describe("").is_none());
    }

    #[test]
    fn version_from_tag_uses_template() {
        assert_eq!(
            version_from_tag("v1.2.3", "v{new_version}"),
            Some("1.2.3".into())
        );
        assert_eq!(
            version_from_tag("release/2.0", "release/{new_version}"),
            Some("2.0".into())
        );
        assert_eq!(version_from_tag("x1.0", "v{new_version}"), None);
    }

    #[test]
    fn short_branch_name_is_sanitized() {
        assert_eq!(short_branch_name("feature/ABC-123_fix"), "featureabc123_fix");
        assert_eq!(
            short_branch_name("a-very-long-branch-name-indeed"),
            "averylongbranchnamei"
        );
    }

    #[test]
    fn outside_repo_is_empty_snapshot() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        if !git_available() || is_inside_repo(&root).unwrap_or(true) {
            return;
        }
        assert_eq!(scm_info(&root, "v{new_version}").unwrap(), ScmInfo::default());
    }

    #[test]
    fn tagged_repo_snapshot() {
        if !git_available() {
            return;
        }
        let (_tmp, root) = init_repo();
        run(&root, &["tag", "v1.2.3"]);

        let info = scm_info(&root, "v{new_version}").unwrap();
        assert_eq!(info.tool.as_deref(), Some("git"));
        assert_eq!(info.current_tag.as_deref(), Some("v1.2.3"));
        assert_eq!(info.current_version.as_deref(), Some("1.2.3"));
        assert_eq!(info.distance_to_latest_tag, Some(0));
        assert_eq!(info.branch_name.as_deref(), Some("main"));
        assert_eq!(info.dirty, Some(false));
        assert_eq!(info.commit_sha.as_ref().map(String::len), Some(40));
    }

    #[test]
    fn untagged_repo_reports_dirty_tree() {
        if !git_available() {
            return;
        }
        let (_tmp, root) = init_repo();
        std::fs::write(root.join("VERSION"), "1.2.4\n").unwrap();

        let info = scm_info(&root, "v{new_version}").unwrap();
        assert!(info.current_tag.is_none());
        assert!(info.is_dirty());
        assert!(info.commit_sha.is_some());
    }

    #[test]
    fn fields_render_absent_values_empty() {
        let fields = ScmInfo::default().fields();
        assert_eq!(fields.len(), 8);
        assert!(fields.iter().all(|(_, v)| v.is_empty()));
        assert!(fields.iter().all(|(name, _)| *name != "current_version"));
    }

    #[test]
    fn fields_include_known_version_in_order() {
        let info = ScmInfo {
            current_version: Some("1.4.0".into()),
            ..ScmInfo::default()
        };
        let names: Vec<&str> = info.fields().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names[3], "current_version");
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn git_error_on_bad_command() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let result = git(&root, &["not-a-real-subcommand"]);
        assert!(result.is_err());
    }
}
