//! Doctor command: diagnose configuration and environment.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use rebump_core::git::{self, ScmInfo};
use rebump_core::{Config, Project, config};
use serde::Serialize;
use tracing::{debug, instrument};

/// File name of the starter config `doctor` offers to create.
const STARTER_CONFIG: &str = ".rebump.yaml";

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    git: GitStatus,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to the project config file, if any
    file: Option<String>,
    /// Whether a project config file was found
    found: bool,
    /// The configured current version
    current_version: Option<String>,
    /// Number of file rules declared
    file_rules: usize,
    /// Validation error, if the configuration is unusable
    error: Option<String>,
}

#[derive(Serialize)]
struct GitStatus {
    /// Whether the `git` binary is on PATH
    available: bool,
    /// Repository metadata, when inside a repository
    scm: Option<ScmInfo>,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    /// Current working directory
    cwd: String,
    /// Relevant environment variables
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

impl EnvVar {
    fn read(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            value: std::env::var(name).ok(),
            description,
        }
    }
}

impl DoctorReport {
    fn gather(config: &Config, cwd: &Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);
        let root = config_file
            .as_deref()
            .and_then(Utf8Path::parent)
            .map_or_else(|| cwd.to_path_buf(), Utf8Path::to_path_buf);
        let error = Project::new(root.clone(), config.clone())
            .err()
            .map(|e| e.to_string());

        let available = git::git_available();
        let scm = if available && git::is_inside_repo(&root).unwrap_or(false) {
            git::scm_info(&root, &config.tag_name).ok()
        } else {
            None
        };

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
                current_version: config.current_version.clone(),
                file_rules: config.files.len(),
                error,
            },
            git: GitStatus { available, scm },
            environment: EnvironmentInfo {
                cwd: cwd.to_string(),
                env_vars: vec![
                    EnvVar::read("XDG_CONFIG_HOME", "Override config directory"),
                    EnvVar::read("XDG_CACHE_HOME", "Override cache directory"),
                    EnvVar::read("RUST_LOG", "Log filter directive"),
                    EnvVar::read("REBUMP_LOG_PATH", "Explicit log file path"),
                    EnvVar::read("REBUMP_LOG_DIR", "Log directory"),
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - The loaded configuration
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let report = DoctorReport::gather(config, cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    if report.config.found {
        println!(
            "  {} Config file: {}",
            "✓".green(),
            report.config.file.as_deref().unwrap_or("").cyan()
        );
    } else {
        println!("  {} No project config file found", "○".yellow());
        offer_config_creation(cwd)?;
    }
    match report.config.current_version {
        Some(ref v) => println!("  {}: {}", "Current version".dimmed(), v.cyan()),
        None => println!("  {} current_version is not set", "○".yellow()),
    }
    println!("  {}: {}", "File rules".dimmed(), report.config.file_rules);
    match report.config.error {
        Some(ref e) => println!("  {} {}", "✗".red(), e.red()),
        None => println!("  {} Configuration is valid", "✓".green()),
    }
    println!();

    println!("{}", "Git".bold().underline());
    if !report.git.available {
        println!("  {} git not found on PATH", "○".yellow());
    } else if let Some(ref scm) = report.git.scm {
        for (name, value) in scm.fields() {
            if !value.is_empty() {
                println!("  {}: {}", name.dimmed(), value.cyan());
            }
        }
    } else {
        println!("  {} Not inside a git repository", "○".dimmed());
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());
    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set_vars.is_empty() {
        println!("  {} No XDG/logging overrides set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {} {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or("").cyan(),
                format!("({})", var.description).dimmed()
            );
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// The config written by [`offer_config_creation`].
fn starter_config() -> Config {
    Config {
        current_version: Some("0.1.0".into()),
        ..Config::default()
    }
}

/// Offer to create a starter project config when none exists.
fn offer_config_creation(cwd: &Utf8Path) -> anyhow::Result<()> {
    // Don't prompt if running non-interactively
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let config_path: Utf8PathBuf = cwd.join(STARTER_CONFIG);
    let create = Confirm::new("Create a starter config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    // Declined or interrupted (Ctrl+C) both mean no file.
    if matches!(create, Ok(true)) {
        let yaml = serde_saphyr::to_string(&starter_config())?;
        std::fs::write(&config_path, yaml)?;
        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}
