//! Core library for rebump.
//!
//! This crate finds version strings in project files and replaces them,
//! driven by per-project configuration.
//!
//! # Modules
//!
//! - [`bump`] - Bump planning and execution
//! - [`config`] - Configuration loading and management
//! - [`context`] - The layered rendering context
//! - [`datafile`] - Key-path edits in JSON and TOML files
//! - [`error`] - Configuration error types
//! - [`files`] - Reading, rewriting, and writing target files
//! - [`git`] - Git metadata for templates
//! - [`pattern`] - Search pattern rendering
//! - [`project`] - A project root with its validated configuration
//! - [`rule`] - Change rules
//! - [`targets`] - File target resolution and the inclusion policy
//! - [`template`] - `{placeholder}` templates
//! - [`version`] - Version parsing and serialization
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8PathBuf;
//! use rebump_core::bump::{BumpRequest, plan_bump};
//! use rebump_core::{ConfigLoader, Project};
//!
//! let root = Utf8PathBuf::from(".");
//! let config = ConfigLoader::new()
//!     .with_project_search(&root)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! let mut project = Project::new(root, config).expect("invalid configuration").detect_scm();
//! let request = BumpRequest {
//!     new_version: "1.3.0".into(),
//!     ..BumpRequest::default()
//! };
//! let plan = plan_bump(&mut project, &request).expect("cannot plan bump");
//! let outcome = plan.execute(project.root(), true).expect("bump failed");
//! println!("{} files would change", outcome.changed_files().count());
//! ```
#![deny(unsafe_code)]

pub mod bump;

pub mod config;

pub mod context;

pub mod datafile;

pub mod error;

pub mod files;

pub mod git;

pub mod pattern;

pub mod project;

pub mod rule;

pub mod targets;

pub mod template;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use context::{ContextBuilder, RenderContext};

pub use error::{ConfigError, ConfigResult};

pub use project::Project;

pub use rule::ChangeRule;
