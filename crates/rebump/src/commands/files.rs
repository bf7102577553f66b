//! Files command: list resolved targets and whether a bump would touch them.

use std::collections::HashSet;

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use rebump_core::{Config, Project};

/// Arguments for the `files` subcommand.
#[derive(Args, Debug, Default)]
pub struct FilesArgs {
    /// Only list files a bump would modify
    #[arg(long)]
    pub included_only: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct FileEntry {
    filename: String,
    rules: usize,
    included: bool,
}

fn gather(project: &mut Project) -> anyhow::Result<Vec<FileEntry>> {
    let effective: HashSet<String> = project
        .files_to_modify()
        .context("failed to resolve file targets")?
        .into_iter()
        .filter_map(|rule| rule.filename)
        .collect();
    let filemap = project
        .resolved_filemap()
        .context("failed to resolve file targets")?;
    Ok(filemap
        .iter()
        .map(|(filename, rules)| FileEntry {
            included: effective.contains(filename),
            filename: filename.clone(),
            rules: rules.len(),
        })
        .collect())
}

/// Execute the files command.
#[instrument(name = "cmd_files", skip_all, fields(json_output))]
pub fn cmd_files(
    args: FilesArgs,
    global_json: bool,
    config: Config,
    root: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing files command");

    let mut project = super::open_project(config, root)?;
    let mut entries = gather(&mut project)?;
    if args.included_only {
        entries.retain(|e| e.included);
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No files configured.".yellow());
        return Ok(());
    }
    for entry in &entries {
        let rules = format!("({} rule{})", entry.rules, if entry.rules == 1 { "" } else { "s" });
        if entry.included {
            println!("  {} {} {}", "✓".green(), entry.filename.cyan(), rules.dimmed());
        } else {
            println!(
                "  {} {} {} excluded",
                "○".dimmed(),
                entry.filename.dimmed(),
                rules.dimmed()
            );
        }
    }
    Ok(())
}
