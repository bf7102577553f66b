//! Configuration loading and discovery.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Merging with the built-in bump defaults
//!
//! # Supported formats
//!
//! The following configuration file formats are supported:
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.rebump.<ext>` in current directory or any parent
//! - `rebump.<ext>` in current directory or any parent
//! - `~/.config/rebump/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use rebump_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! config.validate().unwrap();
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::rule::ChangeRule;
use crate::version::{VersionConfig, VersionPartSpec};

/// Default `parse` pattern: three dot-separated numbers.
pub const DEFAULT_PARSE: &str = r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)";

/// Default `serialize` format.
pub const DEFAULT_SERIALIZE: &str = "{major}.{minor}.{patch}";

/// The configuration for rebump.
///
/// Deserialized from config files found during discovery (TOML, YAML, or JSON).
/// Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,

    /// The version currently written in the project's files.
    pub current_version: Option<String>,
    /// Regex with named groups that splits a version into parts.
    pub parse: String,
    /// Formats for rendering a version, most specific first.
    pub serialize: Vec<String>,
    /// Template for the text to find in each file.
    pub search: String,
    /// Template for the replacement text.
    pub replace: String,
    /// Treat `search` as a regular expression.
    pub regex: bool,
    /// Skip files where `search` is not found instead of failing.
    pub ignore_missing_version: bool,
    /// Allow bumping with uncommitted changes in the working tree.
    pub allow_dirty: bool,

    /// Whether a commit would be made; gates the message preview.
    pub commit: bool,
    /// Commit message template.
    pub message: String,
    /// Whether a tag would be made; gates the tag name preview.
    pub tag: bool,
    /// Tag name template. Also used to find the latest version tag.
    pub tag_name: String,
    /// Tag message template.
    pub tag_message: String,

    /// Per-part settings, keyed by part name.
    pub parts: IndexMap<String, VersionPartSpec>,
    /// Files to update.
    pub files: Vec<FileConfig>,
    /// Paths modified even when listed in `excluded_paths`.
    pub included_paths: Vec<String>,
    /// Paths skipped unless listed in `included_paths`.
    pub excluded_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_dir: None,
            current_version: None,
            parse: DEFAULT_PARSE.to_string(),
            serialize: vec![DEFAULT_SERIALIZE.to_string()],
            search: "{current_version}".to_string(),
            replace: "{new_version}".to_string(),
            regex: false,
            ignore_missing_version: false,
            allow_dirty: false,
            commit: false,
            message: "Bump version: {current_version} → {new_version}".to_string(),
            tag: false,
            tag_name: "v{new_version}".to_string(),
            tag_message: "Bump version: {current_version} → {new_version}".to_string(),
            parts: IndexMap::new(),
            files: Vec::new(),
            included_paths: Vec::new(),
            excluded_paths: Vec::new(),
        }
    }
}

/// One `[[files]]` entry.
///
/// Unset fields inherit the top-level values.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    /// A file to update, relative to the project root.
    pub filename: Option<String>,
    /// A glob selecting files to update. Wins over `filename`.
    pub glob: Option<String>,
    /// Dotted path to a value inside a JSON or TOML file.
    pub key_path: Option<String>,
    /// Overrides the top-level `parse`.
    pub parse: Option<String>,
    /// Overrides the top-level `serialize`.
    pub serialize: Option<Vec<String>>,
    /// Overrides the top-level `search`.
    pub search: Option<String>,
    /// Overrides the top-level `replace`.
    pub replace: Option<String>,
    /// Overrides the top-level `regex`.
    pub regex: Option<bool>,
    /// Overrides the top-level `ignore_missing_version`.
    pub ignore_missing_version: Option<bool>,
}

impl Config {
    /// Check the configuration before any file is touched.
    ///
    /// # Errors
    ///
    /// Returns the first invalid part spec, file entry, or version pattern.
    #[instrument(skip(self), fields(files = self.files.len()))]
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, spec) in &self.parts {
            spec.check().map_err(|reason| ConfigError::InvalidPart {
                name: name.clone(),
                reason,
            })?;
        }
        self.version_config()?;

        for (index, file) in self.files.iter().enumerate() {
            if file.filename.is_none() && file.glob.is_none() {
                return Err(ConfigError::TargetConflict {
                    index,
                    reason: "needs either `filename` or `glob`".to_string(),
                });
            }
            if file.filename.is_some() && file.glob.is_some() {
                debug!(index, "file entry has both filename and glob, using glob");
            }
            if file.parse.is_some() || file.serialize.is_some() {
                let rule = self.rule_for(file);
                VersionConfig::new(&rule.parse, &rule.serialize, &self.parts).map_err(
                    |source| ConfigError::InvalidParse {
                        location: format!("files[{index}]"),
                        source,
                    },
                )?;
            }
        }
        Ok(())
    }

    /// The top-level version configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when `parse` does not compile or `serialize` is empty.
    pub fn version_config(&self) -> ConfigResult<VersionConfig> {
        VersionConfig::new(&self.parse, &self.serialize, &self.parts).map_err(|source| {
            ConfigError::InvalidParse {
                location: "top level".to_string(),
                source,
            }
        })
    }

    /// Change rules for every `[[files]]` entry, in declaration order.
    pub fn change_rules(&self) -> Vec<ChangeRule> {
        self.files.iter().map(|file| self.rule_for(file)).collect()
    }

    /// A rule for `filename` built from the top-level settings.
    pub fn default_rule(&self, filename: impl Into<String>) -> ChangeRule {
        self.rule_for(&FileConfig {
            filename: Some(filename.into()),
            ..FileConfig::default()
        })
    }

    fn rule_for(&self, file: &FileConfig) -> ChangeRule {
        ChangeRule {
            parse: file.parse.clone().unwrap_or_else(|| self.parse.clone()),
            serialize: file
                .serialize
                .clone()
                .unwrap_or_else(|| self.serialize.clone()),
            search: file.search.clone().unwrap_or_else(|| self.search.clone()),
            replace: file.replace.clone().unwrap_or_else(|| self.replace.clone()),
            regex: file.regex.unwrap_or(self.regex),
            ignore_missing_version: file
                .ignore_missing_version
                .unwrap_or(self.ignore_missing_version),
            filename: file.filename.clone(),
            glob: file.glob.clone(),
            key_path: file.key_path.clone(),
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "rebump";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/rebump/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// When walking up directories, stop if we find a directory containing
    /// this file or directory name. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit files (in order added via `with_file`)
    /// 2. Project config (closest to search root)
    /// 3. User config (`~/.config/rebump/config.<ext>`)
    /// 4. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            current_version = config.current_version.as_deref().unwrap_or_default(),
            files = config.files.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();
        let has_explicit = !self.explicit_files.is_empty();

        if !has_user && !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            // The directory holding the marker is searched, its parents are not.
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file [`ConfigLoader::load`] would use, without
/// loading it.
///
/// The search stops at the same `.git` boundary as the loader, so the
/// directory holding the result is the project root.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .find_project_config(start.as_ref())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/rebump/` on Linux, `~/Library/Application Support/rebump/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the user cache directory path.
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.cache_dir().to_path_buf()).ok()
}

/// Get the local data directory path (machine-specific, not synced).
///
/// Log files land under here when no log directory is configured.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}
