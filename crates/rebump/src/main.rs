//! rebump CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use rebump::{Cli, Commands, commands};
use rebump_core::config::{self, ConfigLoader};
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let explicit_config = cli
        .config
        .clone()
        .map(camino::Utf8PathBuf::try_from)
        .transpose()
        .map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = explicit_config {
        loader = loader.with_file(config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let log_settings = observability::LogSettings::new(config.log_dir.clone());
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&log_settings, env_filter)
        .context("failed to initialize logging")?;

    // File targets are relative to the directory holding the config in use.
    let root = explicit_config
        .or_else(|| config::find_project_config(&cwd))
        .and_then(|path| {
            path.parent()
                .filter(|dir| !dir.as_str().is_empty())
                .map(|dir| cwd.join(dir))
        })
        .unwrap_or_else(|| cwd.clone());

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        %root,
        "CLI initialized"
    );

    let result = match cli.command {
        Commands::Bump(args) => commands::bump::cmd_bump(args, cli.json, config, &root),
        Commands::Show(args) => commands::show::cmd_show(args, cli.json, config, &root),
        Commands::Files(args) => commands::files::cmd_files(args, cli.json, config, &root),
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, cli.json, &config, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}
