//! Command implementations

pub mod bump;

pub mod doctor;

pub mod files;

pub mod show;

use anyhow::Context;
use camino::Utf8Path;
use rebump_core::{Config, Project};

/// Open the project at `root` and read its git metadata.
pub(crate) fn open_project(config: Config, root: &Utf8Path) -> anyhow::Result<Project> {
    let project = Project::new(root.to_path_buf(), config).context("invalid configuration")?;
    Ok(project.detect_scm())
}
