//! A project: root directory, validated configuration, and file targets.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::ConfigResult;
use crate::git::{self, ScmInfo};
use crate::rule::ChangeRule;
use crate::targets::{FileTargets, ResolveResult, ResolvedFileMap};
use crate::version::VersionConfig;

/// Everything needed to render templates and resolve targets for one root.
#[derive(Debug, Clone)]
pub struct Project {
    root: Utf8PathBuf,
    config: Config,
    scm_info: ScmInfo,
    version_config: VersionConfig,
    targets: FileTargets,
}

impl Project {
    /// Validate `config` and set up its targets under `root`.
    ///
    /// SCM metadata starts empty; see [`Project::with_scm_info`] and
    /// [`Project::detect_scm`].
    #[instrument(skip_all)]
    pub fn new(root: impl Into<Utf8PathBuf>, config: Config) -> ConfigResult<Self> {
        let root = root.into();
        debug!(%root, "opening project");
        config.validate()?;
        let version_config = config.version_config()?;
        let targets = FileTargets::new(
            config.change_rules(),
            config.included_paths.clone(),
            config.excluded_paths.clone(),
        );
        Ok(Self {
            root,
            config,
            scm_info: ScmInfo::default(),
            version_config,
            targets,
        })
    }

    /// Use this SCM snapshot.
    #[must_use]
    pub fn with_scm_info(mut self, scm_info: ScmInfo) -> Self {
        self.scm_info = scm_info;
        self
    }

    /// Read SCM metadata from git; failures leave the snapshot empty.
    #[must_use]
    pub fn detect_scm(self) -> Self {
        match git::scm_info(&self.root, &self.config.tag_name) {
            Ok(info) => self.with_scm_info(info),
            Err(e) => {
                warn!(error = %e, "could not read git metadata");
                self
            }
        }
    }

    /// The project root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The validated configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The SCM snapshot.
    pub const fn scm_info(&self) -> &ScmInfo {
        &self.scm_info
    }

    /// The top-level version configuration.
    pub const fn version_config(&self) -> &VersionConfig {
        &self.version_config
    }

    /// The file target set.
    pub const fn targets(&self) -> &FileTargets {
        &self.targets
    }

    /// Add files named on the command line.
    ///
    /// Each gets a rule built from the top-level settings and is marked as
    /// included, so exclusions never drop it.
    pub fn add_files<I, S>(&mut self, filenames: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filenames: Vec<String> = filenames.into_iter().map(Into::into).collect();
        if filenames.is_empty() {
            return;
        }
        let template = self.config.default_rule(String::new());
        self.targets.add_files(filenames.iter().cloned(), &template);
        self.targets.include(filenames);
    }

    /// The resolved file map, computed on first access.
    ///
    /// # Errors
    ///
    /// Returns an error when a glob cannot be expanded.
    pub fn resolved_filemap(&mut self) -> ResolveResult<&ResolvedFileMap> {
        self.targets.resolved_filemap(&self.root)
    }

    /// The rules that will actually run, in order.
    ///
    /// # Errors
    ///
    /// Returns an error when a glob cannot be expanded.
    pub fn files_to_modify(&mut self) -> ResolveResult<Vec<ChangeRule>> {
        self.targets.files_to_modify(&self.root)
    }
}
